//! Error taxonomy for the ingestion and query pipeline.
//!
//! Every library component returns [`CatalogError`]. The variants map onto the
//! recovery policy: parse, persistence and index failures fail the owning file
//! (it stays unconsumed and is retried on the next pass), while `BadRequest`
//! and `SearchUnavailable` are surfaced to HTTP callers with distinct statuses.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// The input file could not be read or is not well-formed catalog XML.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A trade code is too short to derive the 6-character short code.
    #[error("invalid code '{code}': expected at least {min} characters")]
    InvalidCode { code: String, min: usize },

    /// The durable store rejected a read or write.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The index engine rejected a write. `ids` lists the documents that were
    /// not indexed as a consequence.
    #[error("index error: {message}")]
    Index { message: String, ids: Vec<String> },

    /// A lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent a request that cannot be executed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The index engine could not answer a query.
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an index error for a write that left `ids` unindexed.
    pub fn index(msg: impl Into<String>, ids: Vec<String>) -> Self {
        Self::Index {
            message: msg.into(),
            ids,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn search_unavailable(msg: impl Into<String>) -> Self {
        Self::SearchUnavailable(msg.into())
    }

    /// Short machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse_error",
            Self::InvalidCode { .. } => "invalid_code",
            Self::Persistence(_) => "persistence_error",
            Self::Index { .. } => "index_error",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::SearchUnavailable(_) => "search_unavailable",
            Self::Io(_) => "io_error",
            Self::Config(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_keeps_failed_ids() {
        let err = CatalogError::index("disk full", vec!["1".into(), "2".into()]);
        match err {
            CatalogError::Index { ids, .. } => assert_eq!(ids, vec!["1", "2"]),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn invalid_code_message_names_the_code() {
        let err = CatalogError::InvalidCode {
            code: "1234".into(),
            min: 6,
        };
        assert_eq!(
            err.to_string(),
            "invalid code '1234': expected at least 6 characters"
        );
        assert_eq!(err.code(), "invalid_code");
    }
}
