use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use interfaces::defs::ItemKind;
use interfaces::services::{LegislativeSource, TextExtractor};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument};

use crate::config::SyncConfig;
use crate::digest::ArticleAggregator;
use crate::discovery::{CodeDiscovery, ReconciliationEngine};
use crate::llm_adapter::Summarizer;
use crate::pipeline::EnrichmentPipeline;
use crate::processing::{Enricher, Illustrator};
use crate::resolver::DependencyResolver;
use crate::store::Store;
use crate::types::{Result, RunReport};
use crate::utils::{day_bounds, local_date};

/// Everything the engine talks to, wired once at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn LegislativeSource>,
    pub store: Arc<dyn Store>,
    pub summarizer: Summarizer,
    pub extractor: Arc<dyn TextExtractor>,
    /// `None` when object storage is not configured.
    pub illustrator: Option<Illustrator>,
}

/// One synchronization run: discovery per kind, event refresh, newsletter.
pub struct LegislativeAggregator {
    store: Arc<dyn Store>,
    discovery: CodeDiscovery,
    reconciliation: ReconciliationEngine,
    pipeline: EnrichmentPipeline,
    newsletter: ArticleAggregator,
    config: SyncConfig,
}

impl LegislativeAggregator {
    pub fn new(collaborators: Collaborators, config: SyncConfig, page_size: u32) -> Self {
        let Collaborators {
            source,
            store,
            summarizer,
            extractor,
            illustrator,
        } = collaborators;

        let illustrator = illustrator.filter(|_| config.illustrate);
        let enricher = Enricher::new(extractor, summarizer.clone(), illustrator, config.economy_mode);
        let resolver = Arc::new(DependencyResolver::new(source.clone(), store.clone(), enricher));

        Self {
            discovery: CodeDiscovery::new(source, page_size),
            reconciliation: ReconciliationEngine::new(store.clone()),
            pipeline: EnrichmentPipeline::new(resolver, config.retry),
            newsletter: ArticleAggregator::new(
                store.clone(),
                summarizer,
                config.retry.newsletter(),
                config.newsletter_max_articles,
                config.timezone,
            ),
            store,
            config,
        }
    }

    pub fn pipeline(&self) -> &EnrichmentPipeline {
        &self.pipeline
    }

    pub fn newsletter(&self) -> &ArticleAggregator {
        &self.newsletter
    }

    pub fn today(&self) -> NaiveDate {
        local_date(Utc::now(), self.config.timezone)
    }

    /// Runs one full synchronization for `today`. Only a store outage or a
    /// configuration problem ends the run early.
    #[instrument(skip_all, fields(date = %today))]
    pub async fn run_once(&self, today: NaiveDate) -> Result<RunReport> {
        let mut report = RunReport::default();
        let since = today - ChronoDuration::days(self.config.lookback_days.max(0));
        self.pipeline.resolver().reset_memo();
        info!("Starting synchronization for {} (since {})", today, since);

        for kind in ItemKind::ALL {
            self.sync_kind(kind, since, &mut report).await?;
        }

        report.events_refreshed = self.refresh_open_events(since).await?;

        match self.newsletter.build_for(today).await {
            Ok(outcome) => report.newsletter_articles = outcome.linked(),
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => error!("Newsletter for {} failed: {}", today, e),
        }

        info!("Synchronization for {} finished\n{}", today, report);
        Ok(report)
    }

    async fn sync_kind(&self, kind: ItemKind, since: NaiveDate, report: &mut RunReport) -> Result<()> {
        let discovered = match self.discovery.list_recent_codes(kind, since).await {
            Ok(codes) => codes,
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => {
                error!("Discovery of {} codes failed: {}", kind, e);
                return Ok(());
            }
        };
        let new_codes = match self.reconciliation.new_codes(kind, &discovered).await {
            Ok(codes) => codes,
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => {
                error!("Reconciliation of {} codes failed: {}", kind, e);
                return Ok(());
            }
        };

        let counters = report.kind_mut(kind);
        counters.discovered = discovered.len();
        counters.new = new_codes.len();

        for code in &new_codes {
            let outcome = self.pipeline.process(kind, code).await?;
            report.kind_mut(kind).record(outcome);
        }
        Ok(())
    }

    async fn refresh_open_events(&self, since: NaiveDate) -> Result<usize> {
        let (from, _) = day_bounds(since, self.config.timezone);
        let open = self.store.open_event_codes(from, Utc::now()).await?;
        let mut refreshed = 0;
        for code in &open {
            if self.pipeline.refresh_event(code).await? {
                refreshed += 1;
            }
        }
        if refreshed > 0 {
            info!("Refreshed {} of {} open events", refreshed, open.len());
        }
        Ok(refreshed)
    }

    /// Runs a synchronization every `interval` until the process stops.
    /// A run that ends early is logged and retried on the next tick.
    pub async fn run_forever(&self) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once(self.today()).await {
                error!("Synchronization run aborted: {}", e);
            }
        }
    }
}
