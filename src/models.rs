//! Core data models used throughout repochat.
//!
//! These types carry source files through the ingestion pipeline and
//! retrieved documents through one query turn.

use std::path::PathBuf;

/// A file yielded by the scanner, content not yet truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

/// One row in the store: a file path and its (possibly truncated) text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub identifier: String,
    pub content: String,
}

impl SourceRecord {
    pub fn new(identifier: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            content: content.into(),
        }
    }
}

/// A similarity search hit, most similar first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub identifier: String,
    pub content: String,
    /// Cosine similarity between the query and the stored vector.
    pub score: f64,
}

impl RetrievedDocument {
    /// Text handed to the reranker and, later, to the model.
    pub fn rerank_text(&self) -> String {
        format!("{}\n\n{}", self.identifier, self.content)
    }
}

/// A retrieved document after reranking, most relevant first.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedDocument {
    pub identifier: String,
    /// `identifier + "\n\n" + content`, exactly as sent to the reranker.
    pub text: String,
    pub relevance: f64,
}
