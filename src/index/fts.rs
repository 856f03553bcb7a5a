//! SQLite FTS5 implementation of [`SearchIndex`].
//!
//! The index lives in its own database file, separate from the durable
//! store, so the two fail independently. The FTS rowid is the store id,
//! which makes replace and delete by id cheap.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;

use crate::db;
use crate::error::{CatalogError, Result};
use crate::migrate;
use crate::models::IndexDocument;

use super::{doc_ids, SearchHit, SearchIndex};

pub struct FtsIndex {
    pool: SqlitePool,
}

impl FtsIndex {
    /// Open the index at `path`, creating the database and FTS table if they
    /// do not exist yet.
    pub async fn open_or_create(path: &Path) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .map_err(|e| CatalogError::index(e.to_string(), Vec::new()))?;
        migrate::run_index_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Quote `query` as a single FTS5 phrase. Embedded double quotes are doubled
/// so user input can never escape into FTS query syntax.
pub fn phrase_query(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

fn rowid_of(doc: &IndexDocument) -> Result<i64> {
    doc.id.parse::<i64>().map_err(|_| {
        CatalogError::index(
            format!("document id '{}' is not a store id", doc.id),
            vec![doc.id.clone()],
        )
    })
}

async fn write_doc(
    conn: &mut SqliteConnection,
    rowid: i64,
    doc: &IndexDocument,
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM catalog_fts WHERE rowid = ?")
        .bind(rowid)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO catalog_fts (rowid, created_at, category, description, hs_code,
                                 tariff_code, country, explanation_sheet, vote)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(rowid)
    .bind(doc.created_at.timestamp())
    .bind(&doc.category)
    .bind(&doc.description)
    .bind(&doc.hs_code)
    .bind(&doc.tariff_code)
    .bind(&doc.country)
    .bind(&doc.explanation_sheet)
    .bind(&doc.vote)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn hit_from_row(row: &SqliteRow) -> SearchHit {
    let rowid: i64 = row.get("id");
    let rank: f64 = row.get("rank");
    let created_at: i64 = row.get("created_at");
    let id = rowid.to_string();
    SearchHit {
        id: id.clone(),
        score: -rank, // negate so higher = better
        document: Some(IndexDocument {
            id,
            created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
            category: row.get("category"),
            description: row.get("description"),
            hs_code: row.get("hs_code"),
            tariff_code: row.get("tariff_code"),
            country: row.get("country"),
            explanation_sheet: row.get("explanation_sheet"),
            vote: row.get("vote"),
        }),
    }
}

#[async_trait]
impl SearchIndex for FtsIndex {
    async fn index_one(&self, doc: &IndexDocument) -> Result<()> {
        let rowid = rowid_of(doc)?;
        let fail = |e: sqlx::Error| CatalogError::index(e.to_string(), vec![doc.id.clone()]);

        let mut tx = self.pool.begin().await.map_err(fail)?;
        write_doc(&mut tx, rowid, doc).await.map_err(fail)?;
        tx.commit().await.map_err(fail)
    }

    async fn index_batch(&self, docs: &[IndexDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let rowids = docs
            .iter()
            .map(rowid_of)
            .collect::<Result<Vec<i64>>>()
            .map_err(|e| CatalogError::index(e.to_string(), doc_ids(docs)))?;
        let fail = |e: sqlx::Error| CatalogError::index(e.to_string(), doc_ids(docs));

        let mut tx = self.pool.begin().await.map_err(fail)?;
        for (rowid, doc) in rowids.into_iter().zip(docs) {
            write_doc(&mut tx, rowid, doc).await.map_err(fail)?;
        }
        tx.commit().await.map_err(fail)
    }

    async fn search(&self, phrase: &str, limit: i64) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT rowid AS id, rank, created_at, category, description, hs_code,
                   tariff_code, country, explanation_sheet, vote
            FROM catalog_fts
            WHERE catalog_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(phrase_query(phrase))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::search_unavailable(e.to_string()))?;

        Ok(rows.iter().map(hit_from_row).collect())
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<u64> {
        let fail = |e: sqlx::Error| CatalogError::index(e.to_string(), ids.to_vec());
        let mut tx = self.pool.begin().await.map_err(fail)?;
        let mut deleted = 0;
        for id in ids {
            let Ok(rowid) = id.parse::<i64>() else { continue };
            deleted += sqlx::query("DELETE FROM catalog_fts WHERE rowid = ?")
                .bind(rowid)
                .execute(&mut *tx)
                .await
                .map_err(fail)?
                .rows_affected();
        }
        tx.commit().await.map_err(fail)?;
        Ok(deleted)
    }

    async fn wipe(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM catalog_fts")
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::index(e.to_string(), Vec::new()))?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM catalog_fts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CatalogError::search_unavailable(e.to_string()))
    }
}
