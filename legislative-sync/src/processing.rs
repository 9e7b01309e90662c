//! Enrichment stages: content retrieval, summary, title, illustration.
//!
//! Each stage is one collaborator call and advances the item's
//! [`EnrichmentProgress`]. Nothing here touches the store.

use std::sync::Arc;

use interfaces::defs::{Classification, EntityKind, Illustration};
use interfaces::services::{
    ExtractedText, ImageGenerator, ObjectStorage, TextExtractor, VisionModel,
};
use interfaces::state::{EnrichmentProgress, EnrichmentStage};
use interfaces::upstream::{UpstreamEvent, UpstreamProposition};
use interfaces::{Code, ServiceError};
use tracing::debug;

use crate::llm_adapter::{prompts, Summarizer};
use crate::types::{Result, SyncError};
use crate::utils::strip_quotes;

/// Image generation, upload and description, bundled because they only
/// make sense together.
#[derive(Clone)]
pub struct Illustrator {
    images: Arc<dyn ImageGenerator>,
    vision: Arc<dyn VisionModel>,
    storage: Arc<dyn ObjectStorage>,
}

impl Illustrator {
    pub fn new(
        images: Arc<dyn ImageGenerator>,
        vision: Arc<dyn VisionModel>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            images,
            vision,
            storage,
        }
    }

    pub async fn illustrate(&self, owner: &Code, summary: &str) -> Result<Illustration> {
        let prompt = format!("{}{}", prompts::ILLUSTRATION, summary);
        let generated = self.images.generate_image(&prompt).await?;
        debug!("Generated image for {} from {}", owner, generated.source_url);
        let image_url = self.storage.store_image(owner, &generated.bytes).await?;
        let description = self.vision.describe_image(&image_url).await?;
        Ok(Illustration {
            image_url,
            description,
        })
    }
}

/// Generated fields of a proposition.
#[derive(Debug, Clone)]
pub struct PropositionContent {
    pub original_text_url: String,
    pub original_text_mime_type: String,
    pub summary: String,
    pub title: String,
    pub illustration: Option<Illustration>,
}

/// Generated fields of an event.
#[derive(Debug, Clone)]
pub struct EventContent {
    pub title: String,
    pub description: String,
}

pub struct Enricher {
    extractor: Arc<dyn TextExtractor>,
    summarizer: Summarizer,
    illustrator: Option<Illustrator>,
    economy_mode: bool,
}

fn advance(progress: &mut EnrichmentProgress, to: EnrichmentStage, code: &Code) -> Result<()> {
    progress.advance(to)?;
    debug!(code = %code, stage = %to, attempt = progress.attempts(), "Advanced");
    Ok(())
}

impl Enricher {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        summarizer: Summarizer,
        illustrator: Option<Illustrator>,
        economy_mode: bool,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            illustrator,
            economy_mode,
        }
    }

    /// Economy mode skips illustration for propositions that only matched
    /// the default type.
    pub fn should_illustrate(&self, classification: Classification) -> bool {
        self.illustrator.is_some() && !(self.economy_mode && classification.is_default)
    }

    /// Original text of a proposition. A missing link, an unsupported
    /// format, a vanished document or an empty extraction all mean there is
    /// nothing to summarize.
    pub async fn original_text(&self, code: &Code, url: Option<&str>) -> Result<(String, ExtractedText)> {
        let no_content = || SyncError::no_content(EntityKind::Proposition, code);
        let url = url.map(str::trim).filter(|u| !u.is_empty()).ok_or_else(no_content)?;

        match self.extractor.extract_text(url).await {
            Ok(extracted) if !extracted.text.trim().is_empty() => Ok((url.to_string(), extracted)),
            Ok(_) => {
                debug!("Extracted no text from {}", url);
                Err(no_content())
            }
            Err(ServiceError::Unsupported(reason)) | Err(ServiceError::NotFound(reason)) => {
                debug!("Original text of {} not retrievable: {}", code, reason);
                Err(no_content())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn enrich_proposition(
        &self,
        upstream: &UpstreamProposition,
        classification: Classification,
        progress: &mut EnrichmentProgress,
    ) -> Result<PropositionContent> {
        let code = &upstream.code;

        let (original_text_url, extracted) = self
            .original_text(code, upstream.original_text_url.as_deref())
            .await?;
        advance(progress, EnrichmentStage::ContentFetched, code)?;

        let summary = self
            .summarizer
            .summarize(prompts::PROPOSITION_SUMMARY, &extracted.text, "proposition summary")
            .await?;
        advance(progress, EnrichmentStage::Summarized, code)?;

        let title = self
            .summarizer
            .summarize(prompts::PROPOSITION_TITLE, &summary, "proposition title")
            .await?;
        advance(progress, EnrichmentStage::Titled, code)?;

        let illustration = match &self.illustrator {
            Some(illustrator) if self.should_illustrate(classification) => {
                let illustration = illustrator.illustrate(code, &summary).await?;
                advance(progress, EnrichmentStage::Illustrated, code)?;
                Some(illustration)
            }
            _ => None,
        };

        Ok(PropositionContent {
            original_text_url,
            original_text_mime_type: extracted.mime_type,
            summary,
            title: strip_quotes(&title),
            illustration,
        })
    }

    /// The event record itself is the retrieved content.
    pub async fn enrich_event(
        &self,
        upstream: &UpstreamEvent,
        progress: &mut EnrichmentProgress,
    ) -> Result<EventContent> {
        let code = &upstream.code;
        advance(progress, EnrichmentStage::ContentFetched, code)?;

        let description = self
            .summarizer
            .summarize(prompts::EVENT_DESCRIPTION, &event_text(upstream), "event description")
            .await?;
        advance(progress, EnrichmentStage::Summarized, code)?;

        let title = self
            .summarizer
            .summarize(prompts::EVENT_TITLE, &description, "event title")
            .await?;
        advance(progress, EnrichmentStage::Titled, code)?;

        Ok(EventContent {
            title: strip_quotes(&title),
            description: strip_quotes(&description),
        })
    }
}

fn event_text(event: &UpstreamEvent) -> String {
    let mut text = format!("{}\n{}", event.title, event.description);
    if !event.location.is_empty() {
        text.push_str(&format!("\nLocal: {}", event.location));
    }
    if !event.agenda.is_empty() {
        text.push_str("\nPauta:");
        for item in &event.agenda {
            text.push_str(&format!("\n- {}", item.title));
            if !item.topic.is_empty() {
                text.push_str(&format!(": {}", item.topic));
            }
        }
    }
    text
}
