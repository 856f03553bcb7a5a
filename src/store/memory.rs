//! In-memory [`CatalogStore`] implementation for tests.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`. A separate sequence mirrors
//! SQLite's `AUTOINCREMENT`: generated ids only ever grow, even across
//! deletes.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{CatalogError, Result};
use crate::models::{CatalogRecord, NewCatalogRecord};

use super::CatalogStore;

pub struct InMemoryCatalogStore {
    rows: RwLock<BTreeMap<i64, CatalogRecord>>,
    sequence: Mutex<i64>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            sequence: Mutex::new(0),
        }
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn insert(&self, record: &NewCatalogRecord) -> Result<CatalogRecord> {
        let mut seq = self.sequence.lock().unwrap();
        *seq += 1;
        let saved = CatalogRecord::from_new(*seq, Utc::now(), record.clone());
        self.rows.write().unwrap().insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn insert_with_id(&self, id: i64, record: &NewCatalogRecord) -> Result<CatalogRecord> {
        let mut seq = self.sequence.lock().unwrap();
        let mut rows = self.rows.write().unwrap();
        if rows.contains_key(&id) {
            return Err(CatalogError::persistence(format!("id {} already exists", id)));
        }
        *seq = (*seq).max(id);
        let saved = CatalogRecord::from_new(id, Utc::now(), record.clone());
        rows.insert(id, saved.clone());
        Ok(saved)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CatalogRecord>> {
        Ok(self.rows.read().unwrap().get(&id).cloned())
    }

    async fn scan_after(&self, after_id: i64, limit: i64) -> Result<Vec<CatalogRecord>> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .range(after_id + 1..)
            .take(limit.max(0) as usize)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<u64> {
        let mut rows = self.rows.write().unwrap();
        Ok(ids.iter().filter(|id| rows.remove(*id).is_some()).count() as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut rows = self.rows.write().unwrap();
        let n = rows.len() as u64;
        rows.clear();
        Ok(n)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.read().unwrap().len() as i64)
    }

    async fn max_id(&self) -> Result<i64> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }
}
