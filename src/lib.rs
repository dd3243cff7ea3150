//! # repochat
//!
//! Ask questions about a codebase from the terminal.
//!
//! repochat indexes source files into a local vector table, then answers
//! questions by retrieving the most similar files, reranking them, and
//! handing the best few to a chat model as context. Answers are printed
//! with syntax-highlighted code blocks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │ Scanner │──▶│ Truncate │──▶│ Embed+Store│──▶│  SQLite  │
//! └─────────┘   └──────────┘   └────────────┘   └────┬─────┘
//!                                                    │ search
//!     ┌──────────┐   ┌──────────┐   ┌────────┐       │
//!     │  Render  │◀──│   Chat   │◀──│ Rerank │◀──────┘
//!     └──────────┘   └──────────┘   └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export VOYAGE_API_KEY=... OPENAI_API_KEY=...
//! repochat index ./my-app          # embed every .rb file
//! repochat ask                     # interactive prompt
//! repochat ask "where is auth?"    # one question
//! repochat status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`tokenize`] | Token counting and budget truncation |
//! | [`scanner`] | Directory walk with subtree exclusion |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store trait, SQLite and in-memory bindings |
//! | [`ingest`] | Indexing pipeline |
//! | [`rerank`] | Reranking service client |
//! | [`chat`] | Chat-completion client and prompt assembly |
//! | [`query`] | Query loop |
//! | [`progress`] | Terminal spinner |
//! | [`render`] | Fenced-code detection and response rendering |
//! | [`highlight`] | Tree-sitter syntax highlighting |
//! | [`status`] | Index status report |

pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod highlight;
pub mod http;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod query;
pub mod render;
pub mod rerank;
pub mod scanner;
pub mod status;
pub mod store;
pub mod tokenize;
