//! Record normalizer: flattens both input schemas into [`NewCatalogRecord`]s.
//!
//! Trade product groups carry HS codes; marketplace listings carry pictures.
//! Fields a schema does not supply stay empty. Normalization is pure and
//! all-or-nothing per document: one invalid item means no records at all.

use crate::error::{CatalogError, Result};
use crate::models::{ListingGroup, NewCatalogRecord, PictureRef, ProductGroup, RawImportDocument};

/// Length of the WCO short code derived from a full tariff code.
pub const SHORT_CODE_LEN: usize = 6;

/// Map one parsed document to catalog records, trade groups first.
pub fn normalize(doc: &RawImportDocument) -> Result<Vec<NewCatalogRecord>> {
    let mut records = Vec::new();
    for group in &doc.product_groups {
        normalize_product_group(group, &mut records)?;
    }
    for group in &doc.listing_groups {
        normalize_listing_group(group, &mut records);
    }
    Ok(records)
}

fn normalize_product_group(group: &ProductGroup, out: &mut Vec<NewCatalogRecord>) -> Result<()> {
    let category = group.name.trim();
    for product in &group.products {
        let code = product.hs_code.trim();
        out.push(NewCatalogRecord {
            category: category.to_string(),
            description: product.description.trim().to_string(),
            hs_code: short_code(code)?,
            tariff_code: code.to_string(),
            ..Default::default()
        });
    }
    Ok(())
}

fn normalize_listing_group(group: &ListingGroup, out: &mut Vec<NewCatalogRecord>) {
    let category = group.kind.trim();
    for item in &group.items {
        out.push(NewCatalogRecord {
            category: category.to_string(),
            description: item.item_name.trim().to_string(),
            picture: PictureRef::Reference(item.image_url.trim().to_string()),
            ..Default::default()
        });
    }
}

/// First [`SHORT_CODE_LEN`] characters of `code`.
pub fn short_code(code: &str) -> Result<String> {
    if code.chars().count() < SHORT_CODE_LEN {
        return Err(CatalogError::InvalidCode {
            code: code.to_string(),
            min: SHORT_CODE_LEN,
        });
    }
    Ok(code.chars().take(SHORT_CODE_LEN).collect())
}
