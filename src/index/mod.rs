//! Full-text index abstraction.
//!
//! The [`SearchIndex`] trait is the inverted index kept alongside the durable
//! store. Documents are keyed by the store id rendered as a string, so a hit
//! can always be joined back to its authoritative row.
//!
//! Queries use whole-phrase containment: every token of the query must appear,
//! adjacent and in order, in one of the document's text fields. Matching is
//! case-insensitive.

pub mod fts;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::IndexDocument;

pub use fts::FtsIndex;
pub use memory::InMemoryIndex;

/// A single match returned by [`SearchIndex::search`].
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Document id (the store id as a string).
    pub id: String,
    /// Relevance score, higher is better.
    pub score: f64,
    /// Stored field values, when the engine keeps them.
    pub document: Option<IndexDocument>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index or replace one document.
    async fn index_one(&self, doc: &IndexDocument) -> Result<()>;

    /// Index or replace a group of documents in one write. Either every
    /// document is written or the call fails with an index error listing all
    /// of their ids.
    async fn index_batch(&self, docs: &[IndexDocument]) -> Result<()>;

    /// Phrase query, best matches first, at most `limit` hits.
    async fn search(&self, phrase: &str, limit: i64) -> Result<Vec<SearchHit>>;

    /// Remove documents by id, returning how many existed.
    async fn delete_ids(&self, ids: &[String]) -> Result<u64>;

    /// Remove every document.
    async fn wipe(&self) -> Result<u64>;

    async fn count(&self) -> Result<i64>;
}

/// Lowercased alphanumeric tokens of `text`, the unit phrase matching works on.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

pub(crate) fn doc_ids(docs: &[IndexDocument]) -> Vec<String> {
    docs.iter().map(|d| d.id.clone()).collect()
}
