//! End-to-end pipeline tests against the SQLite store and FTS5 index.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use catalog_search::config::{parse_config, Config};
use catalog_search::error::{CatalogError, Result};
use catalog_search::index::{FtsIndex, SearchHit, SearchIndex};
use catalog_search::ingest::Ingestor;
use catalog_search::models::{CatalogRecord, IndexDocument, NewCatalogRecord, PictureRef};
use catalog_search::rebuild::reindex_from_store;
use catalog_search::search::SearchService;
use catalog_search::store::{CatalogStore, SqliteCatalogStore};

// ============ Harness ============

fn test_config(root: &Path, batch_size: usize, id_strategy: &str) -> Config {
    let content = format!(
        r#"
[store]
path = "{root}/data/catalog.sqlite"

[index]
path = "{root}/data/catalog-index.sqlite"
batch_size = {batch_size}

[ingest]
root = "{root}/xml"
id_strategy = "{id_strategy}"

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display(),
        batch_size = batch_size,
        id_strategy = id_strategy,
    );
    parse_config(&content).unwrap()
}

fn write_trade(root: &Path, name: &str, group: &str, items: &[(&str, &str)]) {
    let products: String = items
        .iter()
        .map(|(code, desc)| {
            format!(
                "<product><hsCode>{}</hsCode><productDesc>{}</productDesc></product>",
                code, desc
            )
        })
        .collect();
    let xml = format!(
        "<data><productGroup name=\"{}\">{}</productGroup></data>",
        group, products
    );
    let dir = root.join("xml");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), xml).unwrap();
}

fn write_listing(root: &Path, name: &str, kind: &str, item: &str, image: &str) {
    let xml = format!(
        "<data><ListItems type=\"{}\"><Item><ImageURL>{}</ImageURL><ItemName>{}</ItemName>\
         <FOBPrice>US $1</FOBPrice></Item></ListItems></data>",
        kind, image, item
    );
    let dir = root.join("xml");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), xml).unwrap();
}

/// Index wrapper whose bulk writes can be switched to fail.
struct FlakyIndex {
    inner: FtsIndex,
    fail_batches: AtomicBool,
}

#[async_trait]
impl SearchIndex for FlakyIndex {
    async fn index_one(&self, doc: &IndexDocument) -> Result<()> {
        self.inner.index_one(doc).await
    }

    async fn index_batch(&self, docs: &[IndexDocument]) -> Result<()> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(CatalogError::index("injected failure", Vec::new()));
        }
        self.inner.index_batch(docs).await
    }

    async fn search(&self, phrase: &str, limit: i64) -> Result<Vec<SearchHit>> {
        self.inner.search(phrase, limit).await
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<u64> {
        self.inner.delete_ids(ids).await
    }

    async fn wipe(&self) -> Result<u64> {
        self.inner.wipe().await
    }

    async fn count(&self) -> Result<i64> {
        self.inner.count().await
    }
}

/// Store wrapper that rejects inserts after a number of successful ones.
struct FlakyStore {
    inner: SqliteCatalogStore,
    inserts_left: AtomicUsize,
}

impl FlakyStore {
    fn take_insert(&self) -> Result<()> {
        self.inserts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| CatalogError::persistence("injected failure"))
    }
}

#[async_trait]
impl CatalogStore for FlakyStore {
    async fn insert(&self, record: &NewCatalogRecord) -> Result<CatalogRecord> {
        self.take_insert()?;
        self.inner.insert(record).await
    }

    async fn insert_with_id(&self, id: i64, record: &NewCatalogRecord) -> Result<CatalogRecord> {
        self.take_insert()?;
        self.inner.insert_with_id(id, record).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CatalogRecord>> {
        self.inner.get_by_id(id).await
    }

    async fn scan_after(&self, after_id: i64, limit: i64) -> Result<Vec<CatalogRecord>> {
        self.inner.scan_after(after_id, limit).await
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<u64> {
        self.inner.delete_ids(ids).await
    }

    async fn delete_all(&self) -> Result<u64> {
        self.inner.delete_all().await
    }

    async fn count(&self) -> Result<i64> {
        self.inner.count().await
    }

    async fn max_id(&self) -> Result<i64> {
        self.inner.max_id().await
    }
}

struct Pipeline {
    store: Arc<SqliteCatalogStore>,
    index: Arc<FtsIndex>,
    ingestor: Ingestor,
    search: SearchService,
}

async fn pipeline(config: &Config) -> Pipeline {
    let store = Arc::new(SqliteCatalogStore::open(&config.store.path).await.unwrap());
    let index = Arc::new(FtsIndex::open_or_create(&config.index.path).await.unwrap());
    let ingestor = Ingestor::new(store.clone(), index.clone(), config)
        .await
        .unwrap();
    let search = SearchService::new(store.clone(), index.clone(), &config.search);
    Pipeline {
        store,
        index,
        ingestor,
        search,
    }
}

fn ids_of(records: &[CatalogRecord]) -> HashSet<i64> {
    records.iter().map(|r| r.id).collect()
}

// ============ Properties ============

#[tokio::test]
async fn ingested_records_are_retrievable_and_searchable() {
    let tmp = TempDir::new().unwrap();
    write_trade(
        tmp.path(),
        "a.xml",
        "Tools",
        &[("123456", "Widget"), ("654321", "Gadget"), ("111111", "Sprocket")],
    );
    write_listing(tmp.path(), "b.xml", "Electronics", "Phone Case", "http://x/img.png");
    let config = test_config(tmp.path(), 2, "store");
    let mut p = pipeline(&config).await;

    let report = p.ingestor.run_once().await.unwrap();
    assert_eq!(report.files_ingested, 2);
    assert_eq!(report.records_persisted, 4);

    for record in p.store.scan_all().await.unwrap() {
        let fetched = p.store.get_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        let hits = p.search.search(&record.description).await.unwrap();
        assert!(
            hits.iter().any(|r| r.id == record.id),
            "{} not found by description",
            record.description
        );
    }
}

#[tokio::test]
async fn trade_item_scenario() {
    let tmp = TempDir::new().unwrap();
    write_trade(tmp.path(), "trade.xml", "Tools", &[("123456", "Widget")]);
    let config = test_config(tmp.path(), 100, "store");
    let mut p = pipeline(&config).await;
    p.ingestor.run_once().await.unwrap();

    let results = p.search.search("Widget").await.unwrap();
    assert_eq!(results.len(), 1);
    let row = &results[0];
    assert_eq!(row.category, "Tools");
    assert_eq!(row.description, "Widget");
    assert_eq!(row.hs_code, "123456");
    assert_eq!(row.tariff_code, "123456");
}

#[tokio::test]
async fn listing_item_scenario() {
    let tmp = TempDir::new().unwrap();
    write_listing(tmp.path(), "listing.xml", "Electronics", "Phone Case", "http://x/img.png");
    let config = test_config(tmp.path(), 100, "store");
    let mut p = pipeline(&config).await;
    p.ingestor.run_once().await.unwrap();

    let results = p.search.search("Phone Case").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].category, "Electronics");
    assert_eq!(results[0].description, "Phone Case");
    assert_eq!(
        results[0].picture,
        PictureRef::Reference("http://x/img.png".into())
    );
}

#[tokio::test]
async fn short_code_fails_file_without_partial_records() {
    let tmp = TempDir::new().unwrap();
    write_trade(
        tmp.path(),
        "short.xml",
        "Tools",
        &[("123456", "Widget"), ("12345", "Bolt")],
    );
    let config = test_config(tmp.path(), 1, "store");
    let mut p = pipeline(&config).await;

    let report = p.ingestor.run_once().await.unwrap();
    assert_eq!(report.files_failed, 1);
    assert_eq!(p.store.count().await.unwrap(), 0);
    assert_eq!(p.index.count().await.unwrap(), 0);
    assert!(tmp.path().join("xml/short.xml").exists());
}

#[tokio::test]
async fn consumed_files_are_never_reprocessed() {
    let tmp = TempDir::new().unwrap();
    write_trade(tmp.path(), "a.xml", "Tools", &[("123456", "Widget")]);
    let config = test_config(tmp.path(), 10, "store");
    let mut p = pipeline(&config).await;

    assert_eq!(p.ingestor.run_once().await.unwrap().files_ingested, 1);

    write_trade(tmp.path(), "b.xml", "Tools", &[("654321", "Gadget")]);
    let second = p.ingestor.run_once().await.unwrap();
    assert_eq!(second.files_discovered, 1);
    assert_eq!(second.files_ingested, 1);
    assert_eq!(p.store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn index_failure_leaves_files_unconsumed_and_retry_does_not_duplicate() {
    let tmp = TempDir::new().unwrap();
    write_trade(tmp.path(), "a.xml", "Tools", &[("123456", "Widget"), ("654321", "Gadget")]);
    write_trade(tmp.path(), "b.xml", "Tools", &[("111111", "Sprocket")]);
    let config = test_config(tmp.path(), 2, "store");

    let store = Arc::new(SqliteCatalogStore::open(&config.store.path).await.unwrap());
    let index = Arc::new(FlakyIndex {
        inner: FtsIndex::open_or_create(&config.index.path).await.unwrap(),
        fail_batches: AtomicBool::new(true),
    });
    let mut ingestor = Ingestor::new(store.clone(), index.clone(), &config)
        .await
        .unwrap();

    let failed = ingestor.run_once().await.unwrap();
    assert_eq!(failed.files_failed, 2);
    assert_eq!(failed.files_ingested, 0);
    assert!(tmp.path().join("xml/a.xml").exists());
    assert!(tmp.path().join("xml/b.xml").exists());
    assert_eq!(store.count().await.unwrap(), 0);

    index.fail_batches.store(false, Ordering::SeqCst);
    let retried = ingestor.run_once().await.unwrap();
    assert_eq!(retried.files_discovered, 2);
    assert_eq!(retried.files_ingested, 2);
    assert_eq!(store.count().await.unwrap(), 3);
    assert_eq!(index.count().await.unwrap(), 3);
    assert!(tmp.path().join("xml/a_done.xml").exists());
}

#[tokio::test]
async fn store_failure_aborts_only_the_owning_file() {
    let tmp = TempDir::new().unwrap();
    write_trade(tmp.path(), "a.xml", "Tools", &[("123456", "Widget")]);
    write_trade(tmp.path(), "b.xml", "Tools", &[("654321", "Gadget"), ("111111", "Sprocket")]);
    let config = test_config(tmp.path(), 10, "store");

    let store = Arc::new(FlakyStore {
        inner: SqliteCatalogStore::open(&config.store.path).await.unwrap(),
        inserts_left: AtomicUsize::new(2),
    });
    let index = Arc::new(FtsIndex::open_or_create(&config.index.path).await.unwrap());
    let mut ingestor = Ingestor::new(store.clone(), index.clone(), &config)
        .await
        .unwrap();

    let report = ingestor.run_once().await.unwrap();
    assert_eq!(report.files_ingested, 1);
    assert_eq!(report.files_failed, 1);
    assert!(tmp.path().join("xml/a_done.xml").exists());
    assert!(tmp.path().join("xml/b.xml").exists());
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(index.count().await.unwrap(), 1);
}

#[tokio::test]
async fn ids_are_unique_and_shared_between_store_and_index() {
    for strategy in ["store", "counter"] {
        let tmp = TempDir::new().unwrap();
        for n in 0..5 {
            write_trade(
                tmp.path(),
                &format!("f{}.xml", n),
                "Tools",
                &[("123456", "Widget"), ("654321", "Gadget")],
            );
        }
        let config = test_config(tmp.path(), 3, strategy);
        let mut p = pipeline(&config).await;
        p.ingestor.run_once().await.unwrap();

        let rows = p.store.scan_all().await.unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(ids_of(&rows).len(), 10, "duplicate ids with {}", strategy);

        let hits = p.index.search("widget", 100).await.unwrap();
        let index_ids: HashSet<i64> = hits.iter().map(|h| h.id.parse().unwrap()).collect();
        let store_ids: HashSet<i64> = rows
            .iter()
            .filter(|r| r.description == "Widget")
            .map(|r| r.id)
            .collect();
        assert_eq!(index_ids, store_ids, "store/index ids differ with {}", strategy);
    }
}

#[tokio::test]
async fn counter_does_not_reuse_ids_after_restart() {
    let tmp = TempDir::new().unwrap();
    write_trade(tmp.path(), "a.xml", "Tools", &[("123456", "Widget"), ("654321", "Gadget")]);
    let config = test_config(tmp.path(), 10, "counter");
    {
        let mut p = pipeline(&config).await;
        p.ingestor.run_once().await.unwrap();
        p.store.close().await;
        p.index.close().await;
    }

    write_trade(tmp.path(), "b.xml", "Tools", &[("111111", "Sprocket")]);
    let mut p = pipeline(&config).await;
    let report = p.ingestor.run_once().await.unwrap();
    assert_eq!(report.files_ingested, 1);
    assert_eq!(p.store.max_id().await.unwrap(), 3);
}

#[tokio::test]
async fn empty_backlog_run_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    write_trade(tmp.path(), "a.xml", "Tools", &[("123456", "Widget")]);
    let config = test_config(tmp.path(), 10, "store");
    let mut p = pipeline(&config).await;
    p.ingestor.run_once().await.unwrap();

    let rows_before = p.store.scan_all().await.unwrap();
    let docs_before = p.index.count().await.unwrap();

    let report = p.ingestor.run_once().await.unwrap();
    assert_eq!(report.files_discovered, 0);
    assert_eq!(p.store.scan_all().await.unwrap(), rows_before);
    assert_eq!(p.index.count().await.unwrap(), docs_before);
}

#[tokio::test]
async fn rebuild_round_trip_preserves_result_set() {
    let tmp = TempDir::new().unwrap();
    write_trade(
        tmp.path(),
        "a.xml",
        "Tools",
        &[("123456", "Steel widget"), ("654321", "Brass widget"), ("111111", "Bolt")],
    );
    write_listing(tmp.path(), "b.xml", "Widgets", "Widget case", "http://x/w.png");
    let config = test_config(tmp.path(), 2, "store");
    let mut p = pipeline(&config).await;
    p.ingestor.run_once().await.unwrap();

    let before = ids_of(&p.search.search("widget").await.unwrap());
    assert_eq!(before.len(), 3);

    p.index.wipe().await.unwrap();
    assert!(p.search.search("widget").await.unwrap().is_empty());

    let report = reindex_from_store(&*p.store, p.index.clone(), 2)
        .await
        .unwrap();
    assert_eq!(report.documents_indexed, 4);

    let after = ids_of(&p.search.search("widget").await.unwrap());
    assert_eq!(before, after);
}

#[tokio::test]
async fn out_of_band_delete_is_skipped_in_results() {
    let tmp = TempDir::new().unwrap();
    write_trade(tmp.path(), "a.xml", "Tools", &[("123456", "Widget"), ("654321", "Widget")]);
    let config = test_config(tmp.path(), 10, "store");
    let mut p = pipeline(&config).await;
    p.ingestor.run_once().await.unwrap();

    p.store.delete_ids(&[1]).await.unwrap();
    let results = p.search.search("widget").await.unwrap();
    assert_eq!(ids_of(&results), HashSet::from([2]));
}
