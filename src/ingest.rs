//! Ingestion coordinator.
//!
//! Drives every unconsumed input file through
//! `Discovered → Parsed → {PersistedAndIndexed | Failed}`:
//!
//! 1. parse the file and normalize it into records,
//! 2. persist each record (the [`IdAuthority`] assigns its id),
//! 3. hand the matching [`IndexDocument`] to the [`BatchIndexer`],
//! 4. once every document of the file has been flushed to the index, rename
//!    the file so later passes skip it.
//!
//! A file whose documents are still buffered waits in an "awaiting flush"
//! list until the next successful flush. Any failure (parse, store write,
//! index flush) fails the owning file: it is not renamed, the rows and index
//! documents already written for it are deleted best-effort, and the run
//! continues with the next file.
//!
//! Queries are served while a pass runs; they observe a growing index until
//! the pass completes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::batch::BatchIndexer;
use crate::config::{Config, IngestConfig};
use crate::db::Backends;
use crate::error::{CatalogError, Result};
use crate::ids::IdAuthority;
use crate::index::SearchIndex;
use crate::models::IndexDocument;
use crate::normalize::normalize;
use crate::picture::PictureResolver;
use crate::source;
use crate::store::CatalogStore;

/// Lifecycle of one input file within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Discovered,
    Parsed,
    PersistedAndIndexed,
    Failed,
}

/// Counters for one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_discovered: usize,
    pub files_ingested: usize,
    pub files_failed: usize,
    /// Rows persisted for files that were ingested.
    pub records_persisted: usize,
    /// Documents indexed for files that were ingested.
    pub documents_indexed: usize,
}

/// Observable state of the background ingestion task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum IngestStatus {
    /// No pass has been started.
    Idle,
    Running,
    Completed { report: IngestReport },
    Failed { error: String },
}

/// Records written for one file so far.
#[derive(Debug)]
struct FileProgress {
    path: PathBuf,
    store_ids: Vec<i64>,
}

impl FileProgress {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            store_ids: Vec::new(),
        }
    }

    fn doc_ids(&self) -> Vec<String> {
        self.store_ids.iter().map(|id| id.to_string()).collect()
    }

    fn touches(&self, failed: &[String]) -> bool {
        self.store_ids
            .iter()
            .any(|id| failed.iter().any(|f| *f == id.to_string()))
    }
}

pub struct Ingestor {
    store: Arc<dyn CatalogStore>,
    index: Arc<dyn SearchIndex>,
    ids: IdAuthority,
    batcher: BatchIndexer,
    pictures: PictureResolver,
    config: IngestConfig,
    awaiting: Vec<FileProgress>,
}

impl Ingestor {
    pub async fn new(
        store: Arc<dyn CatalogStore>,
        index: Arc<dyn SearchIndex>,
        config: &Config,
    ) -> Result<Self> {
        let ids = IdAuthority::init(config.ingest.id_strategy, store.as_ref()).await?;
        let batcher = BatchIndexer::new(index.clone(), config.index.batch_size);
        let pictures = PictureResolver::new(&config.picture)?;
        Ok(Self {
            store,
            index,
            ids,
            batcher,
            pictures,
            config: config.ingest.clone(),
            awaiting: Vec::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    pub fn ids(&self) -> &IdAuthority {
        &self.ids
    }

    pub fn batch_size(&self) -> usize {
        self.batcher.batch_size()
    }

    pub fn ingest_config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run one pass over every unconsumed file under the ingest root.
    ///
    /// Per-file failures are logged and counted, never returned. Only a
    /// failure to enumerate the input directory fails the pass.
    pub async fn run_once(&mut self) -> Result<IngestReport> {
        let files = source::discover_unprocessed(&self.config)?;
        let mut report = IngestReport {
            files_discovered: files.len(),
            ..Default::default()
        };
        info!(files = files.len(), root = %self.config.root.display(), "Starting ingestion pass");

        for path in &files {
            debug!(file = %path.display(), state = ?FileState::Discovered);
            match self.ingest_file(path, &mut report).await {
                Ok(progress) => self.awaiting.push(progress),
                Err(e) => {
                    report.files_failed += 1;
                    warn!(
                        file = %path.display(),
                        state = ?FileState::Failed,
                        error = %e,
                        "File left unconsumed, will retry next pass"
                    );
                }
            }
        }

        let failed = match self.batcher.flush_remainder().await {
            Ok(_) => Vec::new(),
            Err(e) => self.failed_ids(e),
        };
        self.settle(&failed, &mut report).await;

        info!(
            discovered = report.files_discovered,
            ingested = report.files_ingested,
            failed = report.files_failed,
            records = report.records_persisted,
            "Ingestion pass finished"
        );
        Ok(report)
    }

    async fn ingest_file(&mut self, path: &Path, report: &mut IngestReport) -> Result<FileProgress> {
        let mut progress = FileProgress::new(path);

        let raw = source::parse(path)?;
        let records = normalize(&raw)?;
        debug!(file = %path.display(), state = ?FileState::Parsed, records = records.len());

        for (item, mut record) in records.into_iter().enumerate() {
            record.picture = self.pictures.resolve(record.picture).await;

            let saved = match self.ids.persist(self.store.as_ref(), &record).await {
                Ok(saved) => saved,
                Err(e) => {
                    error!(file = %path.display(), item, error = %e, "Failed to persist record");
                    self.compensate(&progress).await;
                    return Err(e);
                }
            };
            progress.store_ids.push(saved.id);
            self.batcher.add(IndexDocument::from_record(&saved));

            if let Err(e) = self.batcher.flush_if_full().await {
                error!(file = %path.display(), item, error = %e, "Index flush failed");
                let failed = self.failed_ids(e);
                self.settle(&failed, report).await;
                self.compensate(&progress).await;
                return Err(CatalogError::index(
                    format!("batch containing item {} was not indexed", item),
                    progress.doc_ids(),
                ));
            }
            if self.batcher.pending() == 0 {
                self.settle(&[], report).await;
            }
        }

        Ok(progress)
    }

    /// Ids a flush error left unindexed. Anything that is not an index error
    /// fails every file still waiting for a flush.
    fn failed_ids(&self, err: CatalogError) -> Vec<String> {
        match err {
            CatalogError::Index { ids, .. } => ids,
            _ => self.awaiting.iter().flat_map(|p| p.doc_ids()).collect(),
        }
    }

    /// Resolve every file waiting for a flush: files with documents in
    /// `failed` are compensated, the rest are fully indexed and get marked.
    async fn settle(&mut self, failed: &[String], report: &mut IngestReport) {
        for progress in std::mem::take(&mut self.awaiting) {
            if progress.touches(failed) {
                report.files_failed += 1;
                warn!(
                    file = %progress.path.display(),
                    state = ?FileState::Failed,
                    "Index flush failed, file left unconsumed"
                );
                self.compensate(&progress).await;
                continue;
            }

            match source::mark_consumed(&progress.path, &self.config.done_marker) {
                Ok(renamed) => {
                    report.files_ingested += 1;
                    report.records_persisted += progress.store_ids.len();
                    report.documents_indexed += progress.store_ids.len();
                    info!(
                        file = %progress.path.display(),
                        renamed = %renamed.display(),
                        records = progress.store_ids.len(),
                        state = ?FileState::PersistedAndIndexed,
                        "File ingested"
                    );
                }
                Err(e) => {
                    report.files_failed += 1;
                    error!(
                        file = %progress.path.display(),
                        error = %e,
                        "Failed to mark file consumed, rolling back its records"
                    );
                    self.compensate(&progress).await;
                }
            }
        }
    }

    /// Best-effort removal of everything written for a failed file so the
    /// retry does not duplicate records.
    async fn compensate(&mut self, progress: &FileProgress) {
        if progress.store_ids.is_empty() {
            return;
        }
        let doc_ids = progress.doc_ids();
        self.batcher.discard(&doc_ids);

        if let Err(e) = self.index.delete_ids(&doc_ids).await {
            warn!(file = %progress.path.display(), error = %e, "Failed to remove index documents");
        }
        if let Err(e) = self.store.delete_ids(&progress.store_ids).await {
            warn!(file = %progress.path.display(), error = %e, "Failed to remove store rows");
        }
    }
}

/// Start one ingestion pass on a background task.
///
/// The returned receiver starts at [`IngestStatus::Running`] and changes to
/// `Completed` or `Failed` when the pass ends. Other writers wait on the
/// mutex until the pass is done.
pub fn spawn_background(
    ingestor: Arc<Mutex<Ingestor>>,
) -> (watch::Receiver<IngestStatus>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(IngestStatus::Running);
    let handle = tokio::spawn(async move {
        let result = ingestor.lock().await.run_once().await;
        let status = match result {
            Ok(report) => IngestStatus::Completed { report },
            Err(e) => {
                error!(error = %e, "Background ingestion failed");
                IngestStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        let _ = tx.send(status);
    });
    (rx, handle)
}

/// CLI entry point for `catalog ingest`: one foreground pass.
pub async fn run_ingest(config: &Config) -> anyhow::Result<()> {
    let backends = Backends::open(config).await?;
    let mut ingestor =
        Ingestor::new(backends.store.clone(), backends.index.clone(), config).await?;
    let report = ingestor.run_once().await;
    backends.close().await;
    let report = report?;

    println!("ingest {}", config.ingest.root.display());
    println!("  files discovered: {}", report.files_discovered);
    println!("  files ingested: {}", report.files_ingested);
    println!("  files failed: {}", report.files_failed);
    println!("  records persisted: {}", report.records_persisted);
    println!("  documents indexed: {}", report.documents_indexed);
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::index::InMemoryIndex;
    use crate::store::InMemoryCatalogStore;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &Path, batch_size: usize) -> Config {
        let content = format!(
            r#"
[store]
path = "store.sqlite"

[index]
path = "index.sqlite"
batch_size = {}

[ingest]
root = "{}"

[server]
bind = "127.0.0.1:0"
"#,
            batch_size,
            root.display()
        );
        parse_config(&content).unwrap()
    }

    fn trade_xml(group: &str, items: &[(&str, &str)]) -> String {
        let products: String = items
            .iter()
            .map(|(code, desc)| {
                format!(
                    "<product><hsCode>{}</hsCode><productDesc>{}</productDesc></product>",
                    code, desc
                )
            })
            .collect();
        format!(
            "<data><productGroup name=\"{}\">{}</productGroup></data>",
            group, products
        )
    }

    async fn ingestor(root: &Path, batch_size: usize) -> (Ingestor, Arc<InMemoryCatalogStore>) {
        let store = Arc::new(InMemoryCatalogStore::new());
        let index = Arc::new(InMemoryIndex::new());
        let ingestor = Ingestor::new(store.clone(), index, &config(root, batch_size))
            .await
            .unwrap();
        (ingestor, store)
    }

    #[tokio::test]
    async fn ingests_and_marks_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("a.xml"),
            trade_xml("Tools", &[("123456", "Widget"), ("654321", "Gadget")]),
        )
        .unwrap();

        let (mut ingestor, store) = ingestor(tmp.path(), 100).await;
        let report = ingestor.run_once().await.unwrap();

        assert_eq!(report.files_ingested, 1);
        assert_eq!(report.records_persisted, 2);
        assert_eq!(report.documents_indexed, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(tmp.path().join("a_done.xml").exists());
    }

    #[tokio::test]
    async fn invalid_code_fails_file_without_records() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("bad.xml"),
            trade_xml("Tools", &[("123456", "Widget"), ("12", "Short")]),
        )
        .unwrap();

        let (mut ingestor, store) = ingestor(tmp.path(), 1).await;
        let report = ingestor.run_once().await.unwrap();

        assert_eq!(report.files_failed, 1);
        assert_eq!(report.files_ingested, 0);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(tmp.path().join("bad.xml").exists());
    }

    #[tokio::test]
    async fn taken_consumed_name_fails_file_and_rolls_back() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.xml"), trade_xml("Tools", &[("123456", "Widget")])).unwrap();
        fs::write(tmp.path().join("a_done.xml"), "earlier batch").unwrap();

        let (mut ingestor, store) = ingestor(tmp.path(), 10).await;
        let report = ingestor.run_once().await.unwrap();

        assert_eq!(report.files_ingested, 0);
        assert_eq!(report.files_failed, 1);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(ingestor.index().count().await.unwrap(), 0);
        assert!(tmp.path().join("a.xml").exists());
        assert_eq!(
            fs::read_to_string(tmp.path().join("a_done.xml")).unwrap(),
            "earlier batch"
        );
    }

    #[tokio::test]
    async fn empty_document_is_still_consumed() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("empty.xml"), "<data></data>").unwrap();

        let (mut ingestor, _) = ingestor(tmp.path(), 10).await;
        let report = ingestor.run_once().await.unwrap();
        assert_eq!(report.files_ingested, 1);
        assert!(tmp.path().join("empty_done.xml").exists());
    }

    #[tokio::test]
    async fn background_status_reports_completion() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.xml"), trade_xml("Tools", &[("123456", "Widget")])).unwrap();

        let (ingestor, _) = ingestor(tmp.path(), 10).await;
        let (mut status, handle) = spawn_background(Arc::new(Mutex::new(ingestor)));
        handle.await.unwrap();

        status.changed().await.ok();
        match &*status.borrow() {
            IngestStatus::Completed { report } => assert_eq!(report.files_ingested, 1),
            other => panic!("unexpected status: {other:?}"),
        };
    }
}
