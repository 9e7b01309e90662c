use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use interfaces::defs::ClassificationKind;
use legislative_sync::catalog::unmapped_codes;
use legislative_sync::llm_adapter::{OpenAiAdapter, Summarizer};
use legislative_sync::media::{HttpObjectStorage, TikaExtractor};
use legislative_sync::processing::Illustrator;
use legislative_sync::sources::CamaraSource;
use legislative_sync::store::{MemoryStore, PgStore, Store};
use legislative_sync::{Collaborators, Config, LegislativeAggregator};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "legislative-sync")]
#[command(about = "Synchronizes and enriches legislative open data")]
struct Cli {
    /// Keep everything in memory instead of writing to the database
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize periodically until interrupted
    Run,

    /// Run a single synchronization
    SyncOnce {
        /// Reference day (defaults to today in the configured timezone)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Build or extend the newsletter of one day
    Newsletter {
        #[arg(long)]
        date: NaiveDate,
    },

    /// Apply database migrations
    Migrate,

    /// List upstream codes that no curated classification matches
    Catalog {
        /// e.g. proposition_type, event_type, agenda_regime
        #[arg(long)]
        kind: ClassificationKind,
    },
}

async fn open_store(config: &Config, dry_run: bool) -> Result<Arc<dyn Store>> {
    if dry_run {
        warn!("Dry run: nothing will be written to the database");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to apply migrations")?;
    Ok(Arc::new(store))
}

fn collaborators(config: &Config, store: Arc<dyn Store>) -> Result<Collaborators> {
    let source = CamaraSource::new(
        &config.source.base_url,
        config.source.fetch.clone(),
        config.sync.timezone,
    )?;
    let openai = Arc::new(OpenAiAdapter::new(config.llm.clone())?);
    let summarizer = Summarizer::from_config(openai.clone(), &config.llm);
    let extractor = TikaExtractor::new(&config.tika_url, config.llm.timeout)?;

    let illustrator = match &config.storage {
        Some(storage) => {
            let storage = HttpObjectStorage::new(storage.clone(), config.llm.timeout)?;
            Some(Illustrator::new(openai.clone(), openai, Arc::new(storage)))
        }
        None => None,
    };

    Ok(Collaborators {
        source: Arc::new(source),
        store,
        summarizer,
        extractor: Arc::new(extractor),
        illustrator,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    if let Commands::Migrate = cli.command {
        let store = PgStore::connect(&config.database_url)
            .await
            .context("Failed to connect to database")?;
        store.migrate().await.context("Failed to apply migrations")?;
        info!("Migrations applied");
        return Ok(());
    }

    let store = open_store(&config, cli.dry_run).await?;
    let collaborators = collaborators(&config, store)?;

    if let Commands::Catalog { kind } = cli.command {
        let unmapped = unmapped_codes(
            collaborators.source.as_ref(),
            collaborators.store.as_ref(),
            kind,
        )
        .await?;
        for entry in unmapped {
            println!("{}\t{}", entry.code, entry.description);
        }
        return Ok(());
    }

    let aggregator = LegislativeAggregator::new(
        collaborators,
        config.sync.clone(),
        config.source.page_size,
    );

    match cli.command {
        Commands::Run => {
            info!("Synchronizing every {:?}", config.sync.interval);
            tokio::select! {
                _ = aggregator.run_forever() => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
            }
        }
        Commands::SyncOnce { date } => {
            let date = date.unwrap_or_else(|| aggregator.today());
            match aggregator.run_once(date).await {
                Ok(report) => println!("{}", report),
                Err(e) => {
                    error!("Synchronization aborted: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Newsletter { date } => {
            let outcome = aggregator.newsletter().build_for(date).await?;
            println!("{:?}", outcome);
        }
        Commands::Migrate | Commands::Catalog { .. } => {}
    }

    Ok(())
}
