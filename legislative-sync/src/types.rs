use std::collections::BTreeMap;
use std::fmt;

use interfaces::defs::{EntityKind, ItemKind};
use interfaces::state::StageTransitionError;
use interfaces::{Code, ServiceError, ValidationError};
use serde::Serialize;

use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// Minimum spacing between two requests to the same host.
    pub min_request_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Legislative-Sync/1.0".to_string(),
            timeout_seconds: 60,
            max_retries: 3,
            retry_delay_seconds: 2,
            min_request_interval_ms: 250,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    #[error("no retrievable content for {kind} {code}")]
    NoContent { kind: EntityKind, code: Code },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("not found upstream: {0}")]
    NotFound(String),

    #[error("malformed upstream data: {0}")]
    MalformedUpstream(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Stage(#[from] StageTransitionError),
}

impl SyncError {
    pub fn no_content(kind: EntityKind, code: &Code) -> Self {
        SyncError::NoContent {
            kind,
            code: code.clone(),
        }
    }

    pub fn is_no_content(&self) -> bool {
        matches!(self, SyncError::NoContent { .. })
    }

    /// Whether another attempt at the same item may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::TransientUpstream(_)
                | SyncError::PersistenceConflict(_)
                | SyncError::Store(_)
        )
    }

    /// Whether the failure concerns the whole run rather than one item.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            SyncError::StoreUnavailable(_) | SyncError::Configuration(_)
        )
    }
}

impl From<ServiceError> for SyncError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Transient(msg) => SyncError::TransientUpstream(msg),
            ServiceError::NotFound(msg) => SyncError::NotFound(msg),
            ServiceError::Unsupported(msg) => SyncError::MalformedUpstream(format!("unsupported: {}", msg)),
            ServiceError::Malformed(msg) => SyncError::MalformedUpstream(msg),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => SyncError::PersistenceConflict(what),
            StoreError::Unavailable(msg) => SyncError::StoreUnavailable(msg),
            StoreError::MissingDefault(kind) => {
                SyncError::Configuration(format!("no default {} classification seeded", kind))
            }
            other => SyncError::Store(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// What happened to one discovered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Registered,
    /// Registered meanwhile through another discovery path.
    Existing,
    /// Already registered, but drifted upstream and was rewritten.
    Updated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub discovered: usize,
    pub new: usize,
    pub registered: usize,
    pub existing: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl KindReport {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Registered => self.registered += 1,
            ItemOutcome::Existing => self.existing += 1,
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

/// Per-kind counters for one synchronization run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub kinds: BTreeMap<&'static str, KindReport>,
    pub events_refreshed: usize,
    pub newsletter_articles: usize,
}

impl RunReport {
    pub fn kind_mut(&mut self, kind: ItemKind) -> &mut KindReport {
        self.kinds.entry(kind.as_str()).or_default()
    }

    pub fn kind(&self, kind: ItemKind) -> KindReport {
        self.kinds.get(kind.as_str()).cloned().unwrap_or_default()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, r) in &self.kinds {
            writeln!(
                f,
                "{}: discovered={} new={} registered={} existing={} updated={} skipped={} failed={}",
                kind, r.discovered, r.new, r.registered, r.existing, r.updated, r.skipped, r.failed
            )?;
        }
        write!(
            f,
            "events refreshed={} newsletter articles={}",
            self.events_refreshed, self.newsletter_articles
        )
    }
}
