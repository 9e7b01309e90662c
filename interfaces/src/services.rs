use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defs::{ClassificationKind, Code, ItemKind};
use crate::upstream::{
    UpstreamDeputy, UpstreamEvent, UpstreamLegislativeBody, UpstreamParty, UpstreamProposition,
    UpstreamVoting,
};

/// Failure reported by an external collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Timeouts, 5xx responses, dropped connections. Worth another attempt.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator cannot handle this input, e.g. a document format
    /// the text extractor does not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub description: String,
}

/// Read access to the upstream legislative open-data service.
#[async_trait]
pub trait LegislativeSource: Send + Sync {
    /// One page of codes for items of `kind` dated on or after `since`.
    async fn list_recent(
        &self,
        kind: ItemKind,
        since: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> ServiceResult<Vec<Code>>;

    async fn proposition(&self, code: &Code) -> ServiceResult<UpstreamProposition>;

    async fn deputy(&self, code: &Code) -> ServiceResult<UpstreamDeputy>;

    async fn party(&self, acronym: &str) -> ServiceResult<UpstreamParty>;

    async fn legislative_body(&self, code: &Code) -> ServiceResult<UpstreamLegislativeBody>;

    async fn event(&self, code: &Code) -> ServiceResult<UpstreamEvent>;

    async fn voting(&self, code: &Code) -> ServiceResult<UpstreamVoting>;

    /// Every code the upstream currently publishes for a classification kind.
    async fn types_catalog(&self, kind: ClassificationKind) -> ServiceResult<Vec<CatalogEntry>>;
}

/// Text generation. `purpose` is a short label used only for logging.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str, text: &str, purpose: &str) -> ServiceResult<String>;
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe_image(&self, image_url: &str) -> ServiceResult<String>;
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub source_url: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> ServiceResult<GeneratedImage>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads an image and returns its public URL.
    async fn store_image(&self, owner: &Code, bytes: &[u8]) -> ServiceResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub mime_type: String,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, document_url: &str) -> ServiceResult<ExtractedText>;
}
