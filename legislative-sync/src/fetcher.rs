use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use interfaces::{ServiceError, ServiceResult};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use url::Url;

use crate::types::{FetchConfig, Result, SyncError};

/// Rate-limited HTTP client with transport-level retries.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<RwLock<HashMap<String, Instant>>>,
}

/// Maps an unsuccessful HTTP status to the collaborator error taxonomy.
pub fn status_error(status: StatusCode, url: &str) -> ServiceError {
    let message = format!(
        "HTTP {}: {} ({})",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown"),
        url
    );
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => ServiceError::NotFound(message),
        StatusCode::UNSUPPORTED_MEDIA_TYPE | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::Unsupported(message)
        }
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS || s == StatusCode::REQUEST_TIMEOUT => {
            ServiceError::Transient(message)
        }
        _ => ServiceError::Malformed(message),
    }
}

/// Timeouts and connection failures are worth retrying; a body that does not
/// decode is not.
pub fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_decode() {
        ServiceError::Malformed(e.to_string())
    } else if let Some(status) = e.status() {
        status_error(status, e.url().map(Url::as_str).unwrap_or(""))
    } else {
        ServiceError::Transient(e.to_string())
    }
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_secs(self.config.retry_delay_seconds);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: initial * 16,
            multiplier: 2.0,
            max_elapsed_time: Some(initial * 60),
            ..Default::default()
        }
    }

    /// GETs `url` and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> ServiceResult<T> {
        let bytes = self.get_bytes(url).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Malformed(format!("{} ({})", e, url)))
    }

    pub async fn get_bytes(&self, url: &Url) -> ServiceResult<Vec<u8>> {
        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            self.apply_rate_limit(url).await;
            debug!("GET {}", url);

            let result = match self.client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    response.bytes().await.map(|b| b.to_vec()).map_err(transport_error)
                }
                Ok(response) => Err(status_error(response.status(), url.as_str())),
                Err(e) => Err(transport_error(e)),
            };

            let err = match result {
                Ok(bytes) => return Ok(bytes),
                Err(err) => err,
            };

            if matches!(err, ServiceError::Transient(_)) && attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}: {}", attempt + 1, url, delay, err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            }

            if matches!(err, ServiceError::Transient(_)) {
                error!("Giving up on {} after {} attempts: {}", url, attempt + 1, err);
            }
            return Err(err);
        }
    }

    async fn apply_rate_limit(&self, url: &Url) {
        let host = url.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.min_request_interval_ms);

        let mut rate_limiter = self.rate_limiter.write().await;
        if let Some(last_request) = rate_limiter.get(&host) {
            let elapsed = last_request.elapsed();
            if elapsed < min_interval {
                let wait_time = min_interval - elapsed;
                debug!("Rate limiting {}: waiting {:?}", host, wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        rate_limiter.insert(host, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "http://x"),
            ServiceError::Transient(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "http://x"),
            ServiceError::Transient(_)
        ));
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "http://x"),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "http://x"),
            ServiceError::Unsupported(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "http://x"),
            ServiceError::Malformed(_)
        ));
    }
}
