//! Durable store abstraction.
//!
//! The [`CatalogStore`] trait is the system of record for catalog entries.
//! Ingestion writes through it, the query coordinator resolves index hits
//! against it and rebuilds stream its rows back into the index.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CatalogRecord, NewCatalogRecord};

pub use memory::InMemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;

/// Page size used by [`CatalogStore::scan_all`].
const SCAN_PAGE: i64 = 500;

/// Abstract durable store for catalog records.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](CatalogStore::insert) | Insert with a store-generated id |
/// | [`insert_with_id`](CatalogStore::insert_with_id) | Insert with a caller-assigned id |
/// | [`get_by_id`](CatalogStore::get_by_id) | Point lookup, `None` when absent |
/// | [`scan_after`](CatalogStore::scan_after) | Id-ordered page of rows |
/// | [`delete_ids`](CatalogStore::delete_ids) | Remove specific rows |
/// | [`delete_all`](CatalogStore::delete_all) | Truncate |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a record and return it with the generated id and creation time.
    /// Generated ids increase monotonically and are never reused.
    async fn insert(&self, record: &NewCatalogRecord) -> Result<CatalogRecord>;

    /// Insert a record under an id assigned by the caller. Fails if the id is
    /// already taken.
    async fn insert_with_id(&self, id: i64, record: &NewCatalogRecord) -> Result<CatalogRecord>;

    async fn get_by_id(&self, id: i64) -> Result<Option<CatalogRecord>>;

    /// Up to `limit` rows with `id > after_id`, ordered by id.
    async fn scan_after(&self, after_id: i64, limit: i64) -> Result<Vec<CatalogRecord>>;

    /// Delete the given rows, returning how many existed.
    async fn delete_ids(&self, ids: &[i64]) -> Result<u64>;

    async fn delete_all(&self) -> Result<u64>;

    async fn count(&self) -> Result<i64>;

    /// Highest id currently stored, `0` when empty.
    async fn max_id(&self) -> Result<i64>;

    /// Every stored record, in id order.
    async fn scan_all(&self) -> Result<Vec<CatalogRecord>> {
        let mut out = Vec::new();
        let mut after = 0;
        loop {
            let page = self.scan_after(after, SCAN_PAGE).await?;
            let Some(last) = page.last() else { break };
            after = last.id;
            let done = (page.len() as i64) < SCAN_PAGE;
            out.extend(page);
            if done {
                break;
            }
        }
        Ok(out)
    }
}
