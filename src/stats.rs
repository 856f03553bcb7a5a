//! Store and index statistics.
//!
//! A quick view of whether the two sides agree: row and document counts, the
//! drift between them and how many input files are still waiting. A positive
//! drift means store rows are missing from the index; `catalog rebuild`
//! repairs it.

use anyhow::Result as AnyResult;
use serde::Serialize;

use crate::config::{Config, IngestConfig};
use crate::db::Backends;
use crate::error::Result;
use crate::index::SearchIndex;
use crate::source;
use crate::store::CatalogStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub store_records: i64,
    pub index_documents: i64,
    /// `store_records - index_documents`.
    pub drift: i64,
    pub max_id: i64,
    /// Unconsumed input files, `None` when the ingest root is missing.
    pub pending_files: Option<usize>,
}

pub async fn gather_stats(
    store: &dyn CatalogStore,
    index: &dyn SearchIndex,
    ingest: &IngestConfig,
) -> Result<CatalogStats> {
    let store_records = store.count().await?;
    let index_documents = index.count().await?;
    let max_id = store.max_id().await?;
    let pending_files = source::discover_unprocessed(ingest).ok().map(|f| f.len());

    Ok(CatalogStats {
        store_records,
        index_documents,
        drift: store_records - index_documents,
        max_id,
        pending_files,
    })
}

/// Run the stats command: query both databases and print a summary.
pub async fn run_stats(config: &Config) -> AnyResult<()> {
    let backends = Backends::open(config).await?;
    let stats = gather_stats(
        &*backends.store,
        &*backends.index,
        &config.ingest,
    )
    .await;
    backends.close().await;
    let stats = stats?;

    let store_size = file_size(&config.store.path);
    let index_size = file_size(&config.index.path);

    println!("Catalog Search — Stats");
    println!("======================");
    println!();
    println!("  Store:       {} ({})", config.store.path.display(), format_bytes(store_size));
    println!("  Index:       {} ({})", config.index.path.display(), format_bytes(index_size));
    println!();
    println!("  Records:     {}", stats.store_records);
    println!("  Indexed:     {}", stats.index_documents);
    println!("  Drift:       {}", stats.drift);
    println!("  Highest id:  {}", stats.max_id);
    match stats.pending_files {
        Some(n) => println!("  Pending:     {} file(s) in {}", n, config.ingest.root.display()),
        None => println!("  Pending:     ingest root {} not found", config.ingest.root.display()),
    }
    println!();

    Ok(())
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
