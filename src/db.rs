use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::index::FtsIndex;
use crate::store::SqliteCatalogStore;

/// Open (creating if missing) a WAL-mode SQLite database at `path`.
///
/// Both the durable store and the full-text index live in their own database
/// files and each gets its own pool from here.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(|e| CatalogError::Config(format!("invalid database path {}: {}", path.display(), e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| CatalogError::persistence(format!("open {}: {}", path.display(), e)))
}

/// The two independently failing databases, opened from config.
pub struct Backends {
    pub store: Arc<SqliteCatalogStore>,
    pub index: Arc<FtsIndex>,
}

impl Backends {
    pub async fn open(config: &Config) -> Result<Self> {
        let store = SqliteCatalogStore::open(&config.store.path).await?;
        let index = FtsIndex::open_or_create(&config.index.path).await?;
        Ok(Self {
            store: Arc::new(store),
            index: Arc::new(index),
        })
    }

    pub async fn close(&self) {
        self.store.close().await;
        self.index.close().await;
    }
}
