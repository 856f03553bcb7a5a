use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub index: IndexConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub picture: PictureConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_done_marker")]
    pub done_marker: String,
    #[serde(default)]
    pub id_strategy: IdStrategy,
    #[serde(default = "default_on_startup")]
    pub on_startup: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.xml".to_string()]
}
fn default_done_marker() -> String {
    "_done".to_string()
}
fn default_on_startup() -> bool {
    true
}

/// Who hands out record ids.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// The store's auto-increment assigns ids and reports them on insert.
    #[default]
    Store,
    /// A process-wide counter seeded from the store at startup.
    Counter,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PictureConfig {
    #[serde(default)]
    pub mode: PictureMode,
    #[serde(default = "default_picture_timeout")]
    pub timeout_secs: u64,
}

impl Default for PictureConfig {
    fn default() -> Self {
        Self {
            mode: PictureMode::Reference,
            timeout_secs: default_picture_timeout(),
        }
    }
}

fn default_picture_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PictureMode {
    /// Keep the source URL.
    #[default]
    Reference,
    /// Fetch the image and store it base64-encoded.
    Inline,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub resolve: ResolveMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            resolve: ResolveMode::Store,
        }
    }
}

fn default_limit() -> i64 {
    100
}

/// Where search results take their field values from.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Point lookup in the durable store per hit.
    #[default]
    Store,
    /// Decode the stored index fields of each hit.
    Index,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Config {
    /// Address the HTTP server binds to. A `PORT` environment variable wins
    /// over `[server].bind` and listens on all interfaces.
    pub fn bind_addr(&self) -> String {
        match std::env::var("PORT") {
            Ok(port) if !port.trim().is_empty() => format!("0.0.0.0:{}", port.trim()),
            _ => self.server.bind.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.index.batch_size == 0 {
        anyhow::bail!("index.batch_size must be >= 1");
    }

    if config.search.limit < 1 {
        anyhow::bail!("search.limit must be >= 1");
    }

    if config.ingest.done_marker.trim().is_empty() {
        anyhow::bail!("ingest.done_marker must not be empty");
    }

    if config.ingest.include_globs.is_empty() {
        anyhow::bail!("ingest.include_globs must list at least one pattern");
    }

    if config.store.path == config.index.path {
        anyhow::bail!("store.path and index.path must point to different files");
    }

    Ok(config)
}
