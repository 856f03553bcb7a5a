//! Core data models used throughout the catalog pipeline.
//!
//! Input files deserialize into [`RawImportDocument`], the normalizer flattens
//! them into [`NewCatalogRecord`]s, the store assigns ids to produce
//! [`CatalogRecord`]s, and the index receives [`IndexDocument`]s keyed by the
//! same id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ============ Import documents ============

/// One parsed input file. Transient: never persisted as-is.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawImportDocument {
    #[serde(rename = "productGroup", default)]
    pub product_groups: Vec<ProductGroup>,
    #[serde(rename = "ListItems", default)]
    pub listing_groups: Vec<ListingGroup>,
}

/// Trade data: a named group of products carrying HS codes.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProductGroup {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "product", default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Product {
    #[serde(rename = "hsCode", default)]
    pub hs_code: String,
    #[serde(rename = "productDesc", default)]
    pub description: String,
}

/// Marketplace data: listings grouped by type.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ListingGroup {
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "Item", default)]
    pub items: Vec<ListingItem>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ListingItem {
    #[serde(rename = "ImageURL", default)]
    pub image_url: String,
    #[serde(rename = "ItemName", default)]
    pub item_name: String,
    #[serde(rename = "FOBPrice", default)]
    pub price: String,
    #[serde(rename = "TechnicalDetail", default)]
    pub technical_detail: Option<TechnicalDetail>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TechnicalDetail {
    #[serde(rename = "screensize", default)]
    pub screen_size: String,
    #[serde(default)]
    pub certification: String,
}

// ============ Pictures ============

/// A record's picture: either a reference to fetch later or an inlined
/// base64 payload. The empty reference means "no picture".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PictureRef {
    Reference(String),
    Inline { media_type: String, data: String },
}

impl Default for PictureRef {
    fn default() -> Self {
        PictureRef::Reference(String::new())
    }
}

impl PictureRef {
    pub fn is_empty(&self) -> bool {
        matches!(self, PictureRef::Reference(url) if url.is_empty())
    }

    /// Encode for the store's single picture column. Inline payloads become
    /// `data:` URIs so they can be told apart from plain URLs on the way back.
    pub fn to_column(&self) -> String {
        match self {
            PictureRef::Reference(url) => url.clone(),
            PictureRef::Inline { media_type, data } => {
                format!("data:{};base64,{}", media_type, data)
            }
        }
    }

    pub fn from_column(value: &str) -> Self {
        if let Some(rest) = value.strip_prefix("data:") {
            if let Some((media_type, data)) = rest.split_once(";base64,") {
                return PictureRef::Inline {
                    media_type: media_type.to_string(),
                    data: data.to_string(),
                };
            }
        }
        PictureRef::Reference(value.to_string())
    }
}

impl Serialize for PictureRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_column())
    }
}

// ============ Catalog records ============

/// Normalizer output: a catalog entry that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCatalogRecord {
    pub category: String,
    pub description: String,
    pub picture: PictureRef,
    pub hs_code: String,
    pub tariff_code: String,
    pub country: String,
    pub explanation_sheet: String,
    pub vote: String,
}

/// Canonical catalog entry as stored in the durable store.
///
/// Serialized with the field names HTTP clients of the search service expect.
/// Empty optional fields are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    pub id: i64,
    #[serde(rename = "Date")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "Category", skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(rename = "ProductDescription", skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "Picture", skip_serializing_if = "PictureRef::is_empty")]
    pub picture: PictureRef,
    #[serde(rename = "WCOHSCode", skip_serializing_if = "String::is_empty")]
    pub hs_code: String,
    #[serde(rename = "Country", skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(rename = "NationalTariffCode", skip_serializing_if = "String::is_empty")]
    pub tariff_code: String,
    #[serde(rename = "ExplanationSheet", skip_serializing_if = "String::is_empty")]
    pub explanation_sheet: String,
    #[serde(rename = "Vote", skip_serializing_if = "String::is_empty")]
    pub vote: String,
}

impl CatalogRecord {
    pub fn from_new(id: i64, created_at: DateTime<Utc>, new: NewCatalogRecord) -> Self {
        Self {
            id,
            created_at,
            category: new.category,
            description: new.description,
            picture: new.picture,
            hs_code: new.hs_code,
            country: new.country,
            tariff_code: new.tariff_code,
            explanation_sheet: new.explanation_sheet,
            vote: new.vote,
        }
    }
}

// ============ Index documents ============

/// The searchable projection of a [`CatalogRecord`].
///
/// `id` is the store id rendered as a string; it is the join key at query
/// time. The picture is never indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub category: String,
    pub description: String,
    pub hs_code: String,
    pub tariff_code: String,
    pub country: String,
    pub explanation_sheet: String,
    pub vote: String,
}

impl IndexDocument {
    pub fn from_record(record: &CatalogRecord) -> Self {
        Self {
            id: record.id.to_string(),
            created_at: record.created_at,
            category: record.category.clone(),
            description: record.description.clone(),
            hs_code: record.hs_code.clone(),
            tariff_code: record.tariff_code.clone(),
            country: record.country.clone(),
            explanation_sheet: record.explanation_sheet.clone(),
            vote: record.vote.clone(),
        }
    }

    /// Searchable text fields, in index column order.
    pub fn text_fields(&self) -> [&str; 7] {
        [
            &self.category,
            &self.description,
            &self.hs_code,
            &self.tariff_code,
            &self.country,
            &self.explanation_sheet,
            &self.vote,
        ]
    }

    /// Rebuild a record from stored index fields. Returns `None` when the
    /// document id is not a store id.
    pub fn to_record(&self) -> Option<CatalogRecord> {
        let id = self.id.parse::<i64>().ok()?;
        Some(CatalogRecord {
            id,
            created_at: self.created_at,
            category: self.category.clone(),
            description: self.description.clone(),
            picture: PictureRef::default(),
            hs_code: self.hs_code.clone(),
            country: self.country.clone(),
            tariff_code: self.tariff_code.clone(),
            explanation_sheet: self.explanation_sheet.clone(),
            vote: self.vote.clone(),
        })
    }
}
