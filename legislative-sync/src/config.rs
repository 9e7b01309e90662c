use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use dotenvy::dotenv;
use tracing::warn;

use crate::retry::RetryPolicy;
use crate::types::{FetchConfig, Result, SyncError};

pub const DEFAULT_CAMARA_API_URL: &str = "https://dadosabertos.camara.leg.br/api/v2";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub source: SourceConfig,
    pub llm: LlmConfig,
    pub tika_url: String,
    pub storage: Option<StorageConfig>,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub page_size: u32,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub image_model: String,
    pub char_limit: usize,
    pub requests_per_minute: u32,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Pause after every language-model call so the request rate stays
    /// under the configured limit.
    pub fn call_delay(&self) -> Duration {
        match self.requests_per_minute {
            0 => Duration::ZERO,
            rpm => Duration::from_millis(60_000 / rpm as u64),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_url: String,
    pub public_url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub proposition_base: u64,
    pub voting_base: u64,
    pub event_base: u64,
    pub newsletter_base: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            proposition_base: 4,
            voting_base: 4,
            event_base: 5,
            newsletter_base: 5,
        }
    }
}

impl RetryConfig {
    pub fn proposition(&self) -> RetryPolicy {
        RetryPolicy::new(self.proposition_base, self.max_attempts)
    }

    pub fn voting(&self) -> RetryPolicy {
        RetryPolicy::new(self.voting_base, self.max_attempts)
    }

    pub fn event(&self) -> RetryPolicy {
        RetryPolicy::new(self.event_base, self.max_attempts)
    }

    pub fn newsletter(&self) -> RetryPolicy {
        RetryPolicy::new(self.newsletter_base, self.max_attempts)
    }
}

/// Knobs of the synchronization engine itself.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub lookback_days: i64,
    pub interval: Duration,
    pub timezone: FixedOffset,
    pub economy_mode: bool,
    /// Cleared when object storage is not configured.
    pub illustrate: bool,
    pub newsletter_max_articles: usize,
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: 1,
            interval: Duration::from_secs(3600),
            timezone: brasilia(),
            economy_mode: false,
            illustrate: true,
            newsletter_max_articles: 10,
            retry: RetryConfig::default(),
        }
    }
}

fn brasilia() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap_or_else(|| Utc.fix())
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| SyncError::Configuration(format!("{} must be set", name)))
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            SyncError::Configuration(format!("{} must be a valid value ({}): {}", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}

fn at_least_one<T>(name: &str, value: T) -> Result<T>
where
    T: Default + PartialEq,
{
    if value == T::default() {
        return Err(SyncError::Configuration(format!("{} must be at least 1", name)));
    }
    Ok(value)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let timeout_seconds: u64 = parsed_or("REQUEST_TIMEOUT_SECONDS", 60)?;
        let offset_hours: i32 = parsed_or("TIMEZONE_OFFSET_HOURS", -3)?;
        let timezone = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            SyncError::Configuration(format!("TIMEZONE_OFFSET_HOURS out of range: {}", offset_hours))
        })?;

        let storage = match (env::var("STORAGE_UPLOAD_URL"), env::var("STORAGE_PUBLIC_URL")) {
            (Ok(upload_url), Ok(public_url)) => Some(StorageConfig {
                upload_url,
                public_url,
                token: env::var("STORAGE_TOKEN").ok(),
            }),
            _ => {
                warn!("STORAGE_UPLOAD_URL/STORAGE_PUBLIC_URL not set, illustrations are disabled");
                None
            }
        };

        let retry = RetryConfig {
            max_attempts: at_least_one("MAX_ATTEMPTS", parsed_or("MAX_ATTEMPTS", 3)?)?,
            proposition_base: parsed_or("PROPOSITION_RETRY_BASE", 4)?,
            voting_base: parsed_or("VOTING_RETRY_BASE", 4)?,
            event_base: parsed_or("EVENT_RETRY_BASE", 5)?,
            newsletter_base: parsed_or("NEWSLETTER_RETRY_BASE", 5)?,
        };

        let newsletter_max_articles: usize =
            at_least_one("NEWSLETTER_MAX_ARTICLES", parsed_or("NEWSLETTER_MAX_ARTICLES", 10)?)?;
        let interval_seconds: u64 =
            at_least_one("SYNC_INTERVAL_SECONDS", parsed_or("SYNC_INTERVAL_SECONDS", 3600)?)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            source: SourceConfig {
                base_url: var_or("CAMARA_API_URL", DEFAULT_CAMARA_API_URL),
                page_size: parsed_or("DISCOVERY_PAGE_SIZE", 100)?,
                fetch: FetchConfig {
                    timeout_seconds,
                    ..FetchConfig::default()
                },
            },
            llm: LlmConfig {
                api_key: required("OPENAI_API_KEY")?,
                base_url: var_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                text_model: var_or("TEXT_MODEL", "gpt-4o-mini"),
                vision_model: var_or("VISION_MODEL", "gpt-4o-mini"),
                image_model: var_or("IMAGE_MODEL", "dall-e-3"),
                char_limit: parsed_or("LLM_CHAR_LIMIT", 12_000)?,
                requests_per_minute: parsed_or("LLM_REQUESTS_PER_MINUTE", 20)?,
                timeout: Duration::from_secs(timeout_seconds),
            },
            tika_url: var_or("TIKA_URL", "http://localhost:9998"),
            sync: SyncConfig {
                lookback_days: parsed_or("LOOKBACK_DAYS", 1)?,
                interval: Duration::from_secs(interval_seconds),
                timezone,
                economy_mode: parsed_or("ECONOMY_MODE", false)?,
                illustrate: storage.is_some(),
                newsletter_max_articles,
                retry,
            },
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_delay_spreads_requests_over_a_minute() {
        let llm = LlmConfig {
            api_key: "sk-test".into(),
            base_url: DEFAULT_OPENAI_BASE_URL.into(),
            text_model: "m".into(),
            vision_model: "m".into(),
            image_model: "m".into(),
            char_limit: 100,
            requests_per_minute: 20,
            timeout: Duration::from_secs(60),
        };
        assert_eq!(llm.call_delay(), Duration::from_secs(3));
    }

    #[test]
    fn default_sync_config_uses_brasilia_time() {
        let config = SyncConfig::default();
        assert_eq!(config.timezone.local_minus_utc(), -3 * 3600);
        assert_eq!(config.retry.proposition().base_seconds, 4);
        assert_eq!(config.retry.event().base_seconds, 5);
    }

    #[test]
    fn zero_counts_and_intervals_are_rejected() {
        match at_least_one("SYNC_INTERVAL_SECONDS", 0u64) {
            Err(SyncError::Configuration(msg)) => {
                assert_eq!(msg, "SYNC_INTERVAL_SECONDS must be at least 1")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(at_least_one("NEWSLETTER_MAX_ARTICLES", 0usize).is_err());
        assert_eq!(at_least_one("SYNC_INTERVAL_SECONDS", 3600u64).unwrap(), 3600);
    }
}
