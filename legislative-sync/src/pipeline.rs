use std::sync::Arc;

use interfaces::defs::ItemKind;
use interfaces::Code;
use tracing::{debug, error, info, instrument};

use crate::config::RetryConfig;
use crate::resolver::DependencyResolver;
use crate::retry::RetryPolicy;
use crate::store::Upserted;
use crate::types::{ItemOutcome, Result};

/// Drives discovered items through resolution and enrichment, one at a
/// time, each wrapped in its own bounded retry.
pub struct EnrichmentPipeline {
    resolver: Arc<DependencyResolver>,
    retry: RetryConfig,
}

impl EnrichmentPipeline {
    pub fn new(resolver: Arc<DependencyResolver>, retry: RetryConfig) -> Self {
        Self { resolver, retry }
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn policy(&self, kind: ItemKind) -> RetryPolicy {
        match kind {
            ItemKind::Proposition => self.retry.proposition(),
            ItemKind::Voting => self.retry.voting(),
            ItemKind::Event => self.retry.event(),
        }
    }

    async fn attempt(&self, kind: ItemKind, code: &Code) -> Result<Upserted> {
        let label = format!("{} {}", kind, code);
        let resolver = &self.resolver;
        self.policy(kind)
            .run(&label, |attempt| async move {
                if attempt > 1 {
                    debug!("Attempt {} for {} {}", attempt, kind, code);
                }
                resolver.resolve(kind, code).await
            })
            .await
    }

    /// Registers one discovered item. Only failures that concern the whole
    /// run are returned as errors; everything else becomes an outcome.
    #[instrument(skip_all, fields(kind = %kind, code = %code))]
    pub async fn process(&self, kind: ItemKind, code: &Code) -> Result<ItemOutcome> {
        match self.attempt(kind, code).await {
            Ok(Upserted::Created(id)) => {
                debug!(id, "{} {} persisted", kind, code);
                Ok(ItemOutcome::Registered)
            }
            Ok(Upserted::Updated(id)) => {
                info!(id, "{} {} was already registered, updated drifted fields", kind, code);
                Ok(ItemOutcome::Updated)
            }
            Ok(outcome) => {
                info!(id = outcome.id(), "{} {} was already registered", kind, code);
                Ok(ItemOutcome::Existing)
            }
            Err(e) if e.is_no_content() => {
                info!("Skipping {} {}: no retrievable content", kind, code);
                Ok(ItemOutcome::Skipped)
            }
            Err(e) if e.aborts_batch() => Err(e),
            Err(e) => {
                error!("Giving up on {} {}: {}", kind, code, e);
                Ok(ItemOutcome::Failed)
            }
        }
    }

    /// Re-checks a registered event for drifted situation or time window.
    /// Returns whether a write happened.
    #[instrument(skip_all, fields(kind = "event", code = %code))]
    pub async fn refresh_event(&self, code: &Code) -> Result<bool> {
        match self.attempt(ItemKind::Event, code).await {
            Ok(outcome) => Ok(outcome.wrote()),
            Err(e) if e.aborts_batch() => Err(e),
            Err(e) => {
                error!("Could not refresh event {}: {}", code, e);
                Ok(false)
            }
        }
    }
}
