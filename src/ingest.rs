//! Ingestion pipeline orchestration.
//!
//! Scan → truncate → store, one file at a time in scanner order. With
//! `overwrite` the store is dropped and recreated before the first write;
//! otherwise records are upserted and files whose truncated content is
//! unchanged are skipped without re-embedding.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, Credentials};
use crate::embedding::HttpEmbedder;
use crate::models::SourceRecord;
use crate::scanner::{self, ScanFilter};
use crate::store::{self, AddOutcome, SqliteStore, Store};
use crate::tokenize::Tokenizer;

/// Per-run options for [`ingest`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub filter: ScanFilter,
    pub max_tokens: usize,
    pub overwrite: bool,
    pub limit: Option<usize>,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: ScanFilter::new(&config.ingest.exclude_dirs, &config.ingest.extensions),
            max_tokens: config.ingest.max_tokens,
            overwrite: config.ingest.overwrite,
            limit: None,
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: u64,
    pub stored: u64,
    pub unchanged: u64,
    pub dropped: u64,
    pub failed: u64,
    pub truncated: u64,
}

/// Index every eligible file under `root` into `store`.
///
/// Returns the summary; `summary.stored` is the number of records written.
/// Per-file outcomes are reported through `tracing`.
pub async fn ingest(
    store: &dyn Store,
    tokenizer: &Tokenizer,
    root: &Path,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    if options.overwrite {
        store.create_or_replace().await?;
    } else {
        store.ensure().await?;
    }

    let mut summary = IngestSummary::default();
    let files = scanner::scan(root, options.filter.clone())
        .take(options.limit.unwrap_or(usize::MAX));

    for file in files {
        summary.files += 1;
        let identifier = file.path.to_string_lossy().to_string();
        let content = tokenizer.truncate(&file.content, options.max_tokens);
        if content.len() < file.content.len() {
            summary.truncated += 1;
            tracing::debug!(path = %identifier, "truncated to {} tokens", options.max_tokens);
        }

        if !options.overwrite {
            match store.content_hash(&identifier).await {
                Ok(Some(hash)) if hash == store::content_hash(&content) => {
                    summary.unchanged += 1;
                    tracing::info!(path = %identifier, "unchanged");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(path = %identifier, error = %e, "lookup failed, skipping");
                    continue;
                }
            }
        }

        let record = SourceRecord::new(identifier, content);
        match store.add(&record).await {
            Ok(AddOutcome::Stored) => {
                summary.stored += 1;
                tracing::info!(path = %record.identifier, "stored");
            }
            Ok(AddOutcome::Dropped { reason }) => {
                summary.dropped += 1;
                tracing::debug!(path = %record.identifier, %reason, "dropped by store");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(path = %record.identifier, error = %format!("{:#}", e), "store failed, skipping");
            }
        }
    }

    Ok(summary)
}

/// Scan and truncate without touching the store; reports what would be sent.
pub fn dry_run(
    tokenizer: &Tokenizer,
    root: &Path,
    options: &IngestOptions,
) -> (IngestSummary, usize) {
    let mut summary = IngestSummary::default();
    let mut tokens = 0usize;
    for file in scanner::scan(root, options.filter.clone()).take(options.limit.unwrap_or(usize::MAX))
    {
        summary.files += 1;
        let content = tokenizer.truncate(&file.content, options.max_tokens);
        if content.len() < file.content.len() {
            summary.truncated += 1;
        }
        tokens += tokenizer.count(&content);
    }
    (summary, tokens)
}

/// `repochat index`: resolve settings, build the store, run, print the summary.
pub async fn run_index(
    config: &Config,
    root: Option<PathBuf>,
    dry: bool,
    limit: Option<usize>,
    append: bool,
) -> Result<()> {
    let root = root.unwrap_or_else(|| config.ingest.root.clone());
    if !root.is_dir() {
        bail!("Index root does not exist or is not a directory: {}", root.display());
    }

    let tokenizer = Tokenizer::new(config.ingest.token_model()?)?;
    let mut options = IngestOptions::from_config(config);
    options.limit = limit;
    if append {
        options.overwrite = false;
    }

    if dry {
        let (summary, tokens) = dry_run(&tokenizer, &root, &options);
        println!("index {} (dry-run)", root.display());
        println!("  files: {}", summary.files);
        println!("  truncated: {}", summary.truncated);
        println!("  tokens: {}", tokens);
        return Ok(());
    }

    let api_key = Credentials::voyage_from_env()?;
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding, api_key)?);
    let store = SqliteStore::open(&config.db.path, embedder).await?;

    tracing::info!(
        root = %root.display(),
        db = %config.db.path.display(),
        overwrite = options.overwrite,
        "indexing"
    );
    let summary = ingest(&store, &tokenizer, &root, &options).await?;
    store.close().await;

    println!("index {}", root.display());
    println!("  files: {}", summary.files);
    println!("  stored: {}", summary.stored);
    println!("  unchanged: {}", summary.unchanged);
    println!("  dropped: {}", summary.dropped);
    println!("  failed: {}", summary.failed);
    println!("  truncated: {}", summary.truncated);
    println!("ok");
    Ok(())
}
