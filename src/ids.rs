//! Identifier authority: the single place record ids come from.
//!
//! Every record gets its id exactly once, before either the store write or
//! the index write, and both writes use that id.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::config::IdStrategy;
use crate::error::Result;
use crate::models::{CatalogRecord, NewCatalogRecord};
use crate::store::CatalogStore;

pub enum IdAuthority {
    /// The store's auto-increment assigns ids and returns them on insert.
    Store,
    /// Process-wide counter holding the next id to hand out.
    Counter(AtomicI64),
}

impl IdAuthority {
    /// Build the authority for `strategy`. The counter is seeded from the
    /// store so a restart never reuses an id already present.
    pub async fn init(strategy: IdStrategy, store: &dyn CatalogStore) -> Result<Self> {
        match strategy {
            IdStrategy::Store => Ok(IdAuthority::Store),
            IdStrategy::Counter => Ok(IdAuthority::Counter(AtomicI64::new(
                seed_from(store).await?,
            ))),
        }
    }

    /// Take the next counter id. `None` when the store assigns ids.
    pub fn next_id(&self) -> Option<i64> {
        match self {
            IdAuthority::Store => None,
            IdAuthority::Counter(next) => Some(next.fetch_add(1, Ordering::SeqCst)),
        }
    }

    /// Persist `record` and return it with its assigned id.
    pub async fn persist(
        &self,
        store: &dyn CatalogStore,
        record: &NewCatalogRecord,
    ) -> Result<CatalogRecord> {
        match self.next_id() {
            None => store.insert(record).await,
            Some(id) => store.insert_with_id(id, record).await,
        }
    }

    /// Re-read the seed after the store was truncated or rebuilt.
    pub async fn reseed(&self, store: &dyn CatalogStore) -> Result<()> {
        if let IdAuthority::Counter(next) = self {
            next.store(seed_from(store).await?, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// `1 + max(row count, highest id)`. The row count alone can collide with an
/// existing id once rows have been deleted.
async fn seed_from(store: &dyn CatalogStore) -> Result<i64> {
    let count = store.count().await?;
    let max_id = store.max_id().await?;
    Ok(count.max(max_id) + 1)
}
