//! SQLite-backed [`Store`].
//!
//! One table, `code_chunks`, keyed by file path. Vectors are stored as
//! little-endian f32 BLOBs and searched by computing cosine similarity in
//! Rust over every row.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;

use super::{content_hash, rank, AddOutcome, Store};
use crate::db;
use crate::embedding::{self, Embedder};
use crate::models::{RetrievedDocument, SourceRecord};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS code_chunks (
        identifier TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        vector BLOB NOT NULL,
        indexed_at INTEGER NOT NULL
    )
"#;

pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteStore {
    /// Connect and make sure the table exists.
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let pool = db::connect(path).await?;
        let store = Self { pool, embedder };
        store.ensure().await?;
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_or_replace(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS code_chunks")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn ensure(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    async fn add(&self, record: &SourceRecord) -> Result<AddOutcome> {
        let vector = embedding::embed_one(self.embedder.as_ref(), &record.content).await?;
        if let Err(e) = embedding::check_vector(&vector, self.embedder.dims()) {
            return Ok(AddOutcome::Dropped {
                reason: e.to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO code_chunks (identifier, content, content_hash, model, dims, vector, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identifier) DO UPDATE SET
                content = excluded.content,
                content_hash = excluded.content_hash,
                model = excluded.model,
                dims = excluded.dims,
                vector = excluded.vector,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&record.identifier)
        .bind(&record.content)
        .bind(content_hash(&record.content))
        .bind(self.embedder.model_name())
        .bind(vector.len() as i64)
        .bind(embedding::vec_to_blob(&vector))
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(AddOutcome::Stored)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedDocument>> {
        let query_vec = embedding::embed_one(self.embedder.as_ref(), query).await?;

        let rows = sqlx::query("SELECT identifier, content, dims, vector FROM code_chunks")
            .fetch_all(&self.pool)
            .await?;

        let candidates: Vec<RetrievedDocument> = rows
            .iter()
            .filter(|row| row.get::<i64, _>("dims") as usize == query_vec.len())
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let vec = embedding::blob_to_vec(&blob);
                RetrievedDocument {
                    identifier: row.get("identifier"),
                    content: row.get("content"),
                    score: embedding::cosine_similarity(&query_vec, &vec) as f64,
                }
            })
            .collect();

        Ok(rank(candidates, limit))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn content_hash(&self, identifier: &str) -> Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM code_chunks WHERE identifier = ?")
                .bind(identifier)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }
}

/// Summary row for `repochat status`.
#[derive(Debug, Clone)]
pub struct TableStats {
    pub records: i64,
    pub models: Vec<(String, i64, i64)>,
    pub last_indexed_at: Option<i64>,
}

/// Table counts for `repochat status`, read without an embedder. Never
/// writes; a database without the table reports zero records.
pub async fn table_stats(pool: &SqlitePool) -> Result<TableStats> {
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'code_chunks'",
    )
    .fetch_one(pool)
    .await?;
    if tables == 0 {
        return Ok(TableStats {
            records: 0,
            models: Vec::new(),
            last_indexed_at: None,
        });
    }
    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_chunks")
        .fetch_one(pool)
        .await?;
    let last_indexed_at: Option<i64> = sqlx::query_scalar("SELECT MAX(indexed_at) FROM code_chunks")
        .fetch_one(pool)
        .await?;
    let rows = sqlx::query(
        "SELECT model, dims, COUNT(*) AS n FROM code_chunks GROUP BY model, dims ORDER BY n DESC",
    )
    .fetch_all(pool)
    .await?;
    let models = rows
        .iter()
        .map(|row| (row.get("model"), row.get("dims"), row.get("n")))
        .collect();
    Ok(TableStats {
        records,
        models,
        last_indexed_at,
    })
}
