use sqlx::SqlitePool;

use crate::error::{CatalogError, Result};

/// Create the `products` table in the durable store.
///
/// Idempotent. `AUTOINCREMENT` keeps ids from being reused after deletes, and
/// `created_at` defaults to the insert time in unix seconds.
pub async fn run_store_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER)),
            category TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            picture TEXT NOT NULL DEFAULT '',
            hs_code TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            tariff_code TEXT NOT NULL DEFAULT '',
            explanation_sheet TEXT NOT NULL DEFAULT '',
            vote TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CatalogError::persistence(format!("create products table: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at DESC)")
        .execute(pool)
        .await
        .map_err(|e| CatalogError::persistence(format!("create products index: {}", e)))?;

    Ok(())
}

/// Create the FTS5 table backing the search index.
pub async fn run_index_migrations(pool: &SqlitePool) -> Result<()> {
    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='catalog_fts'",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| CatalogError::index(format!("inspect index schema: {}", e), Vec::new()))?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE catalog_fts USING fts5(
                created_at UNINDEXED,
                category,
                description,
                hs_code,
                tariff_code,
                country,
                explanation_sheet,
                vote
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| CatalogError::index(format!("create index table: {}", e), Vec::new()))?;
    }

    Ok(())
}
