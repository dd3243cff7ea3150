//! Storage abstraction for indexed source records.
//!
//! The [`Store`] trait is the only view the pipelines have of the vector
//! store: schema replacement, record insertion, similarity search. Each
//! store owns an [`Embedder`](crate::embedding::Embedder) and embeds record
//! content on write and query text on search.
//!
//! | Implementation | Purpose |
//! |----------------|---------|
//! | [`SqliteStore`] | On-disk table with brute-force cosine search |
//! | [`InMemoryStore`] | Same semantics without a database, for tests |

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::models::{RetrievedDocument, SourceRecord};

/// Result of [`Store::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Stored,
    /// The embedding was empty or had the wrong dimension; the record was
    /// not written.
    Dropped { reason: String },
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Drop every record and recreate the schema empty.
    async fn create_or_replace(&self) -> Result<()>;

    /// Create the schema if missing, keeping existing records.
    async fn ensure(&self) -> Result<()>;

    /// Embed and write one record, replacing any record with the same
    /// identifier.
    async fn add(&self, record: &SourceRecord) -> Result<AddOutcome>;

    /// Up to `limit` records most similar to `query`, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedDocument>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Hash of the stored content for `identifier`, if present.
    async fn content_hash(&self, identifier: &str) -> Result<Option<String>>;
}

/// SHA-256 of record content, hex encoded.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sort by score descending and keep the first `limit`.
pub(crate) fn rank(mut docs: Vec<RetrievedDocument>, limit: usize) -> Vec<RetrievedDocument> {
    docs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    docs.truncate(limit);
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex() {
        let h = content_hash("class Foo; end");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash("class Foo; end"));
        assert_ne!(h, content_hash("class Bar; end"));
    }

    #[test]
    fn rank_orders_and_limits() {
        let doc = |id: &str, score| RetrievedDocument {
            identifier: id.to_string(),
            content: String::new(),
            score,
        };
        let ranked = rank(vec![doc("a", 0.1), doc("b", 0.9), doc("c", 0.5)], 2);
        let ids: Vec<_> = ranked.iter().map(|d| d.identifier.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
