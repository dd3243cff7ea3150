//! Reranking service client.
//!
//! A [`Reranker`] reorders the retrieved candidates by query-specific
//! relevance and keeps the top K. [`VoyageReranker`] calls Voyage's
//! `POST /rerank` endpoint once per query turn, without retries.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::RerankConfig;
use crate::http;

/// One reranked document: its position in the input and its score.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankHit {
    pub index: usize,
    pub relevance: f64,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Most relevant first, at most `top_k` hits.
    async fn rerank(&self, query: &str, documents: &[String], top_k: usize)
        -> Result<Vec<RerankHit>>;
}

pub struct VoyageReranker {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl VoyageReranker {
    pub fn new(config: &RerankConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: http::endpoint(&config.base_url, "rerank"),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Reranker for VoyageReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankHit>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "query": query,
            "documents": documents,
            "model": self.model,
            "top_k": top_k.min(documents.len()),
        });
        let json = http::post_json(&self.client, "Rerank", &self.url, &self.api_key, &body).await?;
        parse_rerank_response(&json, documents.len(), top_k)
    }
}

/// Parse `data[] {index, relevance_score}`, validating indices against the
/// number of submitted documents.
pub fn parse_rerank_response(
    json: &serde_json::Value,
    document_count: usize,
    top_k: usize,
) -> Result<Vec<RerankHit>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid rerank response: missing data array"))?;

    let mut hits = Vec::with_capacity(data.len());
    for item in data {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Invalid rerank response: missing index"))?
            as usize;
        if index >= document_count {
            bail!(
                "Invalid rerank response: index {} out of range for {} documents",
                index,
                document_count
            );
        }
        let relevance = item
            .get("relevance_score")
            .and_then(|s| s.as_f64())
            .unwrap_or(0.0);
        hits.push(RerankHit { index, relevance });
    }

    hits.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    Ok(hits)
}
