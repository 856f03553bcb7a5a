//! Record retrieval by id.
//!
//! Used by both the `catalog get` CLI command and `GET /records/{id}`.

use anyhow::Result as AnyResult;

use crate::config::Config;
use crate::db::Backends;
use crate::error::{CatalogError, Result};
use crate::models::{CatalogRecord, PictureRef};
use crate::store::CatalogStore;

/// Core lookup returning the stored record (used by CLI and server).
pub async fn get_record(store: &dyn CatalogStore, id: i64) -> Result<CatalogRecord> {
    store
        .get_by_id(id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("record {}", id)))
}

/// CLI entry point: calls get_record and prints to stdout.
pub async fn run_get(config: &Config, id: i64) -> AnyResult<()> {
    let backends = Backends::open(config).await?;
    let result = get_record(&*backends.store, id).await;
    backends.close().await;

    let record = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("--- Record ---");
    println!("id:                {}", record.id);
    println!(
        "created_at:        {}",
        record.created_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    print_field("category", &record.category);
    print_field("description", &record.description);
    print_field("hs_code", &record.hs_code);
    print_field("tariff_code", &record.tariff_code);
    print_field("country", &record.country);
    print_field("explanation_sheet", &record.explanation_sheet);
    print_field("vote", &record.vote);
    match &record.picture {
        PictureRef::Reference(url) if url.is_empty() => {}
        PictureRef::Reference(url) => println!("picture:           {}", url),
        PictureRef::Inline { media_type, data } => println!(
            "picture:           inline {} ({} base64 chars)",
            media_type,
            data.len()
        ),
    }

    Ok(())
}

fn print_field(name: &str, value: &str) {
    if !value.is_empty() {
        println!("{:<19}{}", format!("{}:", name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCatalogRecord;
    use crate::store::InMemoryCatalogStore;

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = InMemoryCatalogStore::new();
        assert!(matches!(
            get_record(&store, 42).await,
            Err(CatalogError::NotFound(_))
        ));

        let saved = store
            .insert(&NewCatalogRecord {
                description: "Widget".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(get_record(&store, saved.id).await.unwrap(), saved);
    }
}
