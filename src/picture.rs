//! Picture policy applied at the normalizer boundary.
//!
//! In `reference` mode the listing's image URL is stored as-is. In `inline`
//! mode the image is fetched once during ingestion and stored as a base64
//! payload tagged with its media type. A failed fetch never fails the record:
//! the reference is kept and a warning is logged.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::warn;

use crate::config::{PictureConfig, PictureMode};
use crate::error::{CatalogError, Result};
use crate::models::PictureRef;

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

pub struct PictureResolver {
    mode: PictureMode,
    client: reqwest::Client,
}

impl PictureResolver {
    pub fn new(config: &PictureConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Config(format!("picture http client: {}", e)))?;
        Ok(Self {
            mode: config.mode,
            client,
        })
    }

    pub fn mode(&self) -> PictureMode {
        self.mode
    }

    /// Apply the configured policy to `picture`.
    pub async fn resolve(&self, picture: PictureRef) -> PictureRef {
        let url = match (&self.mode, &picture) {
            (PictureMode::Inline, PictureRef::Reference(url)) if !url.is_empty() => url.clone(),
            _ => return picture,
        };

        match self.fetch(&url).await {
            Ok(inline) => inline,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to inline picture, keeping reference");
                picture
            }
        }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<PictureRef, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(PictureRef::Inline {
            media_type,
            data: STANDARD.encode(&bytes),
        })
    }
}
