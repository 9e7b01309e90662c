use std::time::Duration;

use async_trait::async_trait;
use interfaces::services::{ExtractedText, ObjectStorage, TextExtractor};
use interfaces::{Code, ServiceError, ServiceResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::fetcher::{status_error, transport_error};
use crate::types::{Result, SyncError};

/// Extracts plain text from original documents through an Apache Tika server.
pub struct TikaExtractor {
    client: Client,
    tika_url: String,
}

impl TikaExtractor {
    pub fn new(tika_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            tika_url: tika_url.trim_end_matches('/').to_string(),
        })
    }

    async fn download(&self, document_url: &str) -> ServiceResult<(Vec<u8>, String)> {
        let response = self
            .client
            .get(document_url)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), document_url));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = response.bytes().await.map_err(transport_error)?.to_vec();
        Ok((bytes, mime_type))
    }
}

#[async_trait]
impl TextExtractor for TikaExtractor {
    async fn extract_text(&self, document_url: &str) -> ServiceResult<ExtractedText> {
        let (bytes, mime_type) = self.download(document_url).await?;
        if bytes.is_empty() {
            return Err(ServiceError::Unsupported(format!("empty document at {}", document_url)));
        }
        debug!("Downloaded {} ({} bytes, {})", document_url, bytes.len(), mime_type);

        let endpoint = format!("{}/tika", self.tika_url);
        let response = self
            .client
            .put(&endpoint)
            .header("Accept", "text/plain")
            .header(CONTENT_TYPE, mime_type.as_str())
            .body(bytes)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let err = status_error(status, &endpoint);
            if matches!(err, ServiceError::Unsupported(_)) {
                debug!("Tika cannot parse {} ({})", document_url, mime_type);
            } else {
                warn!(status = %status, "Tika extraction failed for {}", document_url);
            }
            return Err(err);
        }

        let text = response.text().await.map_err(transport_error)?;
        Ok(ExtractedText {
            text: text.trim().to_string(),
            mime_type,
        })
    }
}

/// Uploads generated images with HTTP PUT to a bucket-style endpoint.
pub struct HttpObjectStorage {
    client: Client,
    config: StorageConfig,
}

impl HttpObjectStorage {
    pub fn new(config: StorageConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn object_key(owner: &Code) -> String {
        format!("{}/{}.png", owner, Uuid::new_v4())
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn store_image(&self, owner: &Code, bytes: &[u8]) -> ServiceResult<String> {
        let key = Self::object_key(owner);
        let upload_url = format!("{}/{}", self.config.upload_url.trim_end_matches('/'), key);

        let mut request = self
            .client
            .put(&upload_url)
            .header(CONTENT_TYPE, "image/png")
            .body(bytes.to_vec());
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), &upload_url));
        }

        let public_url = format!("{}/{}", self.config.public_url.trim_end_matches('/'), key);
        debug!("Stored image for {} at {}", owner, public_url);
        Ok(public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_grouped_by_owner() {
        let key = HttpObjectStorage::object_key(&Code::from(2418823));
        assert!(key.starts_with("2418823/"));
        assert!(key.ends_with(".png"));
    }
}
