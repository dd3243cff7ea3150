//! In-memory [`Store`] implementation for testing.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, in insertion order.
//! Search is brute-force cosine similarity, like the SQLite store.

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use super::{content_hash, rank, AddOutcome, Store};
use crate::embedding::{self, Embedder};
use crate::models::{RetrievedDocument, SourceRecord};

struct StoredRecord {
    record: SourceRecord,
    hash: String,
    vector: Vec<f32>,
}

pub struct InMemoryStore {
    records: RwLock<Vec<StoredRecord>>,
    embedder: Arc<dyn Embedder>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            embedder,
        }
    }

    /// Stored records in insertion order.
    pub fn records(&self) -> Vec<SourceRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.record.clone())
            .collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_or_replace(&self) -> Result<()> {
        self.records.write().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }

    async fn ensure(&self) -> Result<()> {
        Ok(())
    }

    async fn add(&self, record: &SourceRecord) -> Result<AddOutcome> {
        let vector = embedding::embed_one(self.embedder.as_ref(), &record.content).await?;
        if let Err(e) = embedding::check_vector(&vector, self.embedder.dims()) {
            return Ok(AddOutcome::Dropped {
                reason: e.to_string(),
            });
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.retain(|r| r.record.identifier != record.identifier);
        records.push(StoredRecord {
            record: record.clone(),
            hash: content_hash(&record.content),
            vector,
        });
        Ok(AddOutcome::Stored)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedDocument>> {
        let query_vec = embedding::embed_one(self.embedder.as_ref(), query).await?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let candidates = records
            .iter()
            .map(|r| RetrievedDocument {
                identifier: r.record.identifier.clone(),
                content: r.record.content.clone(),
                score: embedding::cosine_similarity(&query_vec, &r.vector) as f64,
            })
            .collect();
        Ok(rank(candidates, limit))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    async fn content_hash(&self, identifier: &str) -> Result<Option<String>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.record.identifier == identifier)
            .map(|r| r.hash.clone()))
    }
}
