//! Query coordinator: phrase search over the index, joined back to the store.
//!
//! Hits come back in index relevance order, capped at `search.limit`, with no
//! pagination. In the default `store` resolve mode each hit is re-read from
//! the durable store by id; a hit whose row is gone is skipped and a failed
//! lookup drops only that hit. In `index` mode records are decoded from the
//! fields the index stores, without the picture.
//!
//! Results may lag a running ingestion pass: the index grows while it runs.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use tracing::{debug, warn};

use crate::config::{Config, ResolveMode, SearchConfig};
use crate::db::Backends;
use crate::error::{CatalogError, Result};
use crate::index::{SearchHit, SearchIndex};
use crate::models::CatalogRecord;
use crate::store::CatalogStore;

pub struct SearchService {
    store: Arc<dyn CatalogStore>,
    index: Arc<dyn SearchIndex>,
    limit: i64,
    resolve: ResolveMode,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        index: Arc<dyn SearchIndex>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            store,
            index,
            limit: config.limit,
            resolve: config.resolve,
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Records matching `query` as a whole phrase, best first.
    pub async fn search(&self, query: &str) -> Result<Vec<CatalogRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CatalogError::bad_request("query must not be empty"));
        }

        let hits = self
            .index
            .search(query, self.limit)
            .await
            .map_err(|e| match e {
                CatalogError::SearchUnavailable(_) => e,
                other => CatalogError::search_unavailable(other.to_string()),
            })?;
        debug!(query, hits = hits.len(), "Index returned hits");

        let mut records = Vec::with_capacity(hits.len());
        for hit in &hits {
            let resolved = match self.resolve {
                ResolveMode::Store => self.resolve_from_store(hit).await,
                ResolveMode::Index => hit.document.as_ref().and_then(|d| d.to_record()),
            };
            if let Some(record) = resolved {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn resolve_from_store(&self, hit: &SearchHit) -> Option<CatalogRecord> {
        let Ok(id) = hit.id.parse::<i64>() else {
            warn!(id = %hit.id, "Index hit is not a store id, skipping");
            return None;
        };
        match self.store.get_by_id(id).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                debug!(id, "Index hit has no store row, skipping");
                None
            }
            Err(e) => {
                warn!(id, error = %e, "Store lookup failed, dropping hit");
                None
            }
        }
    }
}

/// CLI entry point for `catalog search`.
pub async fn run_search(config: &Config, query: &str) -> AnyResult<()> {
    let backends = Backends::open(config).await?;
    let service = SearchService::new(
        backends.store.clone(),
        backends.index.clone(),
        &config.search,
    );

    let records = service.search(query).await;
    backends.close().await;
    let records = records?;

    if records.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        println!(
            "{}. [{}] {} | {}",
            i + 1,
            record.id,
            record.category,
            record.description
        );
        if !record.hs_code.is_empty() {
            println!("    hs code: {}  tariff code: {}", record.hs_code, record.tariff_code);
        }
    }
    println!();
    println!("{} result(s)", records.len());

    Ok(())
}
