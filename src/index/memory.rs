//! In-memory [`SearchIndex`] implementation for tests.
//!
//! Brute-force phrase matching over the tokenized text fields. The score is
//! the number of fields containing the phrase.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::IndexDocument;

use super::{tokenize, SearchHit, SearchIndex};

pub struct InMemoryIndex {
    docs: RwLock<HashMap<String, IndexDocument>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn index_one(&self, doc: &IndexDocument) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn index_batch(&self, docs: &[IndexDocument]) -> Result<()> {
        let mut stored = self.docs.write().unwrap();
        for doc in docs {
            stored.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn search(&self, phrase: &str, limit: i64) -> Result<Vec<SearchHit>> {
        let needle = tokenize(phrase);
        let docs = self.docs.read().unwrap();
        let mut hits: Vec<SearchHit> = docs
            .values()
            .filter_map(|doc| {
                let matches = doc
                    .text_fields()
                    .iter()
                    .filter(|field| contains_phrase(&tokenize(field), &needle))
                    .count();
                (matches > 0).then(|| SearchHit {
                    id: doc.id.clone(),
                    score: matches as f64,
                    document: Some(doc.clone()),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<u64> {
        let mut docs = self.docs.write().unwrap();
        Ok(ids.iter().filter(|id| docs.remove(*id).is_some()).count() as u64)
    }

    async fn wipe(&self) -> Result<u64> {
        let mut docs = self.docs.write().unwrap();
        let n = docs.len() as u64;
        docs.clear();
        Ok(n)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.docs.read().unwrap().len() as i64)
    }
}
