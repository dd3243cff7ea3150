//! TOML configuration and service credentials.
//!
//! Every section is optional; missing keys fall back to the defaults below,
//! which reproduce the stock setup (Voyage `voyage-code-2` embeddings and
//! `rerank-2`, OpenAI chat completions, Ruby sources).
//!
//! Credentials never live in the config file. They are read from the
//! environment (optionally populated from a `.env` file) by
//! [`Credentials::from_env`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::tokenize::TokenModel;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config/repochat.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".repochat/index.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
    /// Drop and recreate the store at the start of every run.
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            max_tokens: default_max_tokens(),
            tokenizer: default_tokenizer(),
            overwrite: default_overwrite(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_extensions() -> Vec<String> {
    vec![".rb".to_string()]
}
fn default_exclude_dirs() -> Vec<String> {
    ["vendor", "node_modules", "build", "dist", ".git"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_tokens() -> usize {
    16_000
}
fn default_tokenizer() -> String {
    "cl100k".to_string()
}
fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_voyage_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_voyage_url(),
            model: default_embedding_model(),
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_voyage_url() -> String {
    "https://api.voyageai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "voyage-code-2".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_voyage_url")]
    pub base_url: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            base_url: default_voyage_url(),
            model: default_rerank_model(),
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_rerank_model() -> String {
    "rerank-2".to_string()
}
fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            model: default_chat_model(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_k: default_candidate_k(),
        }
    }
}

fn default_candidate_k() -> usize {
    50
}

impl IngestConfig {
    /// Parsed tokenizer selection. Valid after [`Config::validate`].
    pub fn token_model(&self) -> Result<TokenModel> {
        self.tokenizer
            .parse::<TokenModel>()
            .map_err(|e| anyhow::anyhow!("ingest.tokenizer: {}", e))
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.ingest.max_tokens == 0 {
            bail!("ingest.max_tokens must be > 0");
        }
        if self.ingest.extensions.is_empty() {
            bail!("ingest.extensions must list at least one extension");
        }
        self.ingest.token_model()?;

        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        if self.rerank.top_k < 1 {
            bail!("rerank.top_k must be >= 1");
        }
        if self.retrieval.candidate_k < self.rerank.top_k {
            bail!(
                "retrieval.candidate_k ({}) must be >= rerank.top_k ({})",
                self.retrieval.candidate_k,
                self.rerank.top_k
            );
        }
        Ok(())
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Resolve the config for a CLI invocation.
///
/// An explicit path must exist. Without one, the default path is used when
/// present and built-in defaults otherwise.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

/// API keys for the hosted services.
#[derive(Clone)]
pub struct Credentials {
    /// Used for embeddings and reranking.
    pub voyage_api_key: String,
    /// Used for chat completions.
    pub openai_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("voyage_api_key", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

pub const VOYAGE_API_KEY: &str = "VOYAGE_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

impl Credentials {
    /// Read both keys, loading `.env` from the working directory first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Only the key needed for embeddings (the `index` command).
    pub fn voyage_from_env() -> Result<String> {
        let _ = dotenvy::dotenv();
        require(VOYAGE_API_KEY, std::env::var(VOYAGE_API_KEY).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            voyage_api_key: require(VOYAGE_API_KEY, lookup(VOYAGE_API_KEY))?,
            openai_api_key: require(OPENAI_API_KEY, lookup(OPENAI_API_KEY))?,
        })
    }
}

fn require(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!(
            "{} is not set. Export it or add it to a .env file in the working directory.",
            name
        ),
    }
}
