//! SQLite-backed [`CatalogStore`] implementation.
//!
//! Rows live in the `products` table created by [`crate::migrate`]. Ids come
//! from `INTEGER PRIMARY KEY AUTOINCREMENT`, so a deleted id is never handed
//! out again, and `created_at` is set by the database on insert.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::error::{CatalogError, Result};
use crate::migrate;
use crate::models::{CatalogRecord, NewCatalogRecord, PictureRef};

use super::CatalogStore;

pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the store database at `path` and make sure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_store_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn store_err(context: &str) -> impl Fn(sqlx::Error) -> CatalogError + '_ {
    move |e| CatalogError::persistence(format!("{}: {}", context, e))
}

fn record_from_row(row: &SqliteRow) -> CatalogRecord {
    let created_at: i64 = row.get("created_at");
    let picture: String = row.get("picture");
    CatalogRecord {
        id: row.get("id"),
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
        category: row.get("category"),
        description: row.get("description"),
        picture: PictureRef::from_column(&picture),
        hs_code: row.get("hs_code"),
        country: row.get("country"),
        tariff_code: row.get("tariff_code"),
        explanation_sheet: row.get("explanation_sheet"),
        vote: row.get("vote"),
    }
}

const RETURNING: &str = "RETURNING id, created_at";

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn insert(&self, record: &NewCatalogRecord) -> Result<CatalogRecord> {
        let sql = format!(
            r#"
            INSERT INTO products (category, description, picture, hs_code, country,
                                  tariff_code, explanation_sheet, vote)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            {}
            "#,
            RETURNING
        );
        let row = sqlx::query(&sql)
            .bind(&record.category)
            .bind(&record.description)
            .bind(record.picture.to_column())
            .bind(&record.hs_code)
            .bind(&record.country)
            .bind(&record.tariff_code)
            .bind(&record.explanation_sheet)
            .bind(&record.vote)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("insert"))?;

        let id: i64 = row.get("id");
        let created_at: i64 = row.get("created_at");
        Ok(CatalogRecord::from_new(
            id,
            DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
            record.clone(),
        ))
    }

    async fn insert_with_id(&self, id: i64, record: &NewCatalogRecord) -> Result<CatalogRecord> {
        let sql = format!(
            r#"
            INSERT INTO products (id, category, description, picture, hs_code, country,
                                  tariff_code, explanation_sheet, vote)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            {}
            "#,
            RETURNING
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&record.category)
            .bind(&record.description)
            .bind(record.picture.to_column())
            .bind(&record.hs_code)
            .bind(&record.country)
            .bind(&record.tariff_code)
            .bind(&record.explanation_sheet)
            .bind(&record.vote)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("insert with id"))?;

        let created_at: i64 = row.get("created_at");
        Ok(CatalogRecord::from_new(
            id,
            DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
            record.clone(),
        ))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CatalogRecord>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("get by id"))?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn scan_after(&self, after_id: i64, limit: i64) -> Result<Vec<CatalogRecord>> {
        let rows = sqlx::query("SELECT * FROM products WHERE id > ? ORDER BY id ASC LIMIT ?")
            .bind(after_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("scan"))?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(store_err("begin"))?;
        let mut deleted = 0;
        for id in ids {
            deleted += sqlx::query("DELETE FROM products WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(store_err("delete"))?
                .rows_affected();
        }
        tx.commit().await.map_err(store_err("commit"))?;
        Ok(deleted)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM products")
            .execute(&self.pool)
            .await
            .map_err(store_err("delete all"))?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("count"))
    }

    async fn max_id(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("max id"))
    }
}
