//! Recovery paths for a store and index that have drifted apart.
//!
//! - [`reindex_from_store`]: wipe the index and stream every store row back
//!   through a [`BatchIndexer`]. The store is untouched.
//! - [`reset_and_ingest`]: start over from the input files. Truncates the
//!   store, wipes the index, reseeds the id authority and runs an ingestion
//!   pass over every unconsumed file.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use serde::Serialize;
use tracing::info;

use crate::batch::BatchIndexer;
use crate::config::Config;
use crate::db::Backends;
use crate::error::Result;
use crate::index::SearchIndex;
use crate::ingest::{IngestReport, Ingestor};
use crate::models::IndexDocument;
use crate::store::CatalogStore;

/// Store page size used while re-streaming rows.
const REINDEX_PAGE: i64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub documents_removed: u64,
    pub documents_indexed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub records_removed: u64,
    pub documents_removed: u64,
    pub ingest: IngestReport,
}

/// Wipe the index and re-index every store row, in id order.
pub async fn reindex_from_store(
    store: &dyn CatalogStore,
    index: Arc<dyn SearchIndex>,
    batch_size: usize,
) -> Result<RebuildReport> {
    let documents_removed = index.wipe().await?;
    info!(removed = documents_removed, "Index wiped, re-streaming store rows");

    let mut batcher = BatchIndexer::new(index, batch_size);
    let mut documents_indexed = 0;
    let mut after = 0;
    loop {
        let page = store.scan_after(after, REINDEX_PAGE).await?;
        let Some(last) = page.last() else { break };
        after = last.id;

        for record in &page {
            batcher.add(IndexDocument::from_record(record));
            documents_indexed += batcher.flush_if_full().await?;
        }
    }
    documents_indexed += batcher.flush_remainder().await?;

    info!(indexed = documents_indexed, "Index rebuilt from store");
    Ok(RebuildReport {
        documents_removed,
        documents_indexed,
    })
}

/// Truncate both sides and ingest the input files again.
///
/// Only files without the consumed marker are read; consumed files must be
/// renamed back by the operator to be picked up.
pub async fn reset_and_ingest(ingestor: &mut Ingestor) -> Result<ResetReport> {
    let records_removed = ingestor.store().delete_all().await?;
    let documents_removed = ingestor.index().wipe().await?;
    ingestor.ids().reseed(ingestor.store().as_ref()).await?;
    info!(
        records = records_removed,
        documents = documents_removed,
        "Store and index truncated"
    );

    let ingest = ingestor.run_once().await?;
    Ok(ResetReport {
        records_removed,
        documents_removed,
        ingest,
    })
}

/// CLI entry point for `catalog rebuild`.
pub async fn run_rebuild(config: &Config, truncate: bool) -> AnyResult<()> {
    let backends = Backends::open(config).await?;

    if truncate {
        let mut ingestor =
            Ingestor::new(backends.store.clone(), backends.index.clone(), config).await?;
        let report = reset_and_ingest(&mut ingestor).await;
        backends.close().await;
        let report = report?;

        println!("rebuild (truncate)");
        println!("  records removed: {}", report.records_removed);
        println!("  documents removed: {}", report.documents_removed);
        println!("  files ingested: {}", report.ingest.files_ingested);
        println!("  files failed: {}", report.ingest.files_failed);
        println!("  records persisted: {}", report.ingest.records_persisted);
    } else {
        let report = reindex_from_store(
            &*backends.store,
            backends.index.clone(),
            config.index.batch_size,
        )
        .await;
        backends.close().await;
        let report = report?;

        println!("rebuild");
        println!("  documents removed: {}", report.documents_removed);
        println!("  documents indexed: {}", report.documents_indexed);
    }
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::models::NewCatalogRecord;
    use crate::store::InMemoryCatalogStore;

    #[tokio::test]
    async fn reindex_restores_missing_documents() {
        let store = InMemoryCatalogStore::new();
        let index = Arc::new(InMemoryIndex::new());
        for n in 0..7 {
            let saved = store
                .insert(&NewCatalogRecord {
                    category: "Tools".into(),
                    description: format!("widget {}", n),
                    ..Default::default()
                })
                .await
                .unwrap();
            if n % 2 == 0 {
                index.index_one(&IndexDocument::from_record(&saved)).await.unwrap();
            }
        }
        assert_eq!(index.count().await.unwrap(), 4);

        let report = reindex_from_store(&store, index.clone(), 3).await.unwrap();
        assert_eq!(report.documents_removed, 4);
        assert_eq!(report.documents_indexed, 7);
        assert_eq!(index.count().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn reindex_of_empty_store_leaves_empty_index() {
        let store = InMemoryCatalogStore::new();
        let index = Arc::new(InMemoryIndex::new());
        let report = reindex_from_store(&store, index.clone(), 10).await.unwrap();
        assert_eq!(report, RebuildReport::default());
    }
}
