//! Batch indexer: buffers index documents and writes them in bulk.
//!
//! The buffer never holds more than `batch_size` documents between
//! [`BatchIndexer::flush_if_full`] calls. A failed flush drains the buffer and
//! reports every id that was not indexed, so the caller can fail the files
//! those documents came from.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::error::{CatalogError, Result};
use crate::index::{doc_ids, SearchIndex};
use crate::models::IndexDocument;

pub struct BatchIndexer {
    index: Arc<dyn SearchIndex>,
    batch_size: usize,
    pending: Vec<IndexDocument>,
}

impl BatchIndexer {
    pub fn new(index: Arc<dyn SearchIndex>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            index,
            batch_size,
            pending: Vec::with_capacity(batch_size),
        }
    }

    pub fn add(&mut self, doc: IndexDocument) {
        self.pending.push(doc);
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    /// Number of buffered documents.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Flush when the buffer reached `batch_size`. Returns the number of
    /// documents written, `0` when nothing was flushed.
    pub async fn flush_if_full(&mut self) -> Result<usize> {
        if !self.is_full() {
            return Ok(0);
        }
        self.flush().await
    }

    /// Flush whatever is buffered. Called at the end of every run so no
    /// document stays buffered past it.
    pub async fn flush_remainder(&mut self) -> Result<usize> {
        self.flush().await
    }

    /// Drop buffered documents with the given ids without indexing them.
    pub fn discard(&mut self, ids: &[String]) -> usize {
        let before = self.pending.len();
        self.pending.retain(|doc| !ids.contains(&doc.id));
        before - self.pending.len()
    }

    #[instrument(skip(self))]
    async fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let docs: Vec<IndexDocument> = self.pending.drain(..).collect();
        let count = docs.len();

        match self.index.index_batch(&docs).await {
            Ok(()) => {
                debug!(count, "Flushed documents to index");
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, count, "Failed to flush documents to index");
                let message = match e {
                    CatalogError::Index { message, .. } => message,
                    other => other.to_string(),
                };
                Err(CatalogError::index(message, doc_ids(&docs)))
            }
        }
    }
}
