pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod digest;
pub mod discovery;
pub mod fetcher;
pub mod llm_adapter;
pub mod media;
pub mod parser;
pub mod pipeline;
pub mod processing;
pub mod resolver;
pub mod retry;
pub mod sources;
pub mod store;
pub mod testing;
pub mod types;
pub mod utils;

pub use aggregator::{Collaborators, LegislativeAggregator};
pub use config::Config;
pub use digest::{ArticleAggregator, NewsletterOutcome};
pub use discovery::{CodeDiscovery, ReconciliationEngine};
pub use pipeline::EnrichmentPipeline;
pub use resolver::DependencyResolver;
pub use types::*;
