mod common;

use std::time::Duration;

use common::*;
use interfaces::defs::{ClassificationKind, EntityKind, ItemKind};
use interfaces::Code;
use legislative_sync::config::SyncConfig;
use legislative_sync::types::{ItemOutcome, Result};
use tokio::time::Instant;

fn config(illustrate: bool) -> SyncConfig {
    SyncConfig {
        illustrate,
        ..SyncConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_after_four_seconds() -> Result<()> {
    let h = Harness::new();
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    h.source.fail_next(EntityKind::Proposition, "2345678", 1);
    let aggregator = h.aggregator(config(false));

    let started = Instant::now();
    let outcome = aggregator
        .pipeline()
        .process(ItemKind::Proposition, &Code::from("2345678"))
        .await?;

    assert_eq!(outcome, ItemOutcome::Registered);
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    assert_eq!(h.source.fetches(EntityKind::Proposition, "2345678"), 2);
    assert_eq!(h.store.propositions().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_mark_the_item_failed() -> Result<()> {
    let h = Harness::new();
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    h.source.fail_next(EntityKind::Proposition, "2345678", 5);
    let aggregator = h.aggregator(config(false));

    let started = Instant::now();
    let outcome = aggregator
        .pipeline()
        .process(ItemKind::Proposition, &Code::from("2345678"))
        .await?;

    assert_eq!(outcome, ItemOutcome::Failed);
    assert_eq!(started.elapsed(), Duration::from_secs(4 + 16));
    assert_eq!(h.source.fetches(EntityKind::Proposition, "2345678"), 3);
    assert_eq!(h.store.total_writes(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn events_back_off_with_base_five() -> Result<()> {
    let h = Harness::new();
    h.source.add_event(upstream_event("70001"));
    h.source.fail_next(EntityKind::Event, "70001", 1);
    let aggregator = h.aggregator(config(false));

    let started = Instant::now();
    let outcome = aggregator
        .pipeline()
        .process(ItemKind::Event, &Code::from("70001"))
        .await?;

    assert_eq!(outcome, ItemOutcome::Registered);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(h.store.events().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn item_without_content_is_skipped_without_retry() -> Result<()> {
    let h = Harness::new();
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    h.extractor.set_unsupported(&text_url("2345678"));
    let aggregator = h.aggregator(config(false));

    let started = Instant::now();
    let outcome = aggregator
        .pipeline()
        .process(ItemKind::Proposition, &Code::from("2345678"))
        .await?;

    assert_eq!(outcome, ItemOutcome::Skipped);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(h.extractor.calls(&text_url("2345678")), 1);
    assert_eq!(h.text.calls().len(), 0);
    assert_eq!(h.store.total_writes(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_summary_retries_the_whole_item() -> Result<()> {
    let h = Harness::new();
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    h.text.fail_next(1);
    let aggregator = h.aggregator(config(false));

    let outcome = aggregator
        .pipeline()
        .process(ItemKind::Proposition, &Code::from("2345678"))
        .await?;

    assert_eq!(outcome, ItemOutcome::Registered);
    assert_eq!(h.extractor.calls(&text_url("2345678")), 2);
    assert_eq!(h.text.calls_for("proposition summary"), 1);
    assert_eq!(h.store.propositions().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn store_outage_aborts_instead_of_failing_the_item() {
    let h = Harness::new();
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    h.store.set_unavailable(true);
    let aggregator = h.aggregator(config(false));

    let err = aggregator
        .pipeline()
        .process(ItemKind::Proposition, &Code::from("2345678"))
        .await
        .unwrap_err();
    assert!(err.aborts_batch());
}

#[tokio::test(start_paused = true)]
async fn illustration_follows_economy_mode() -> Result<()> {
    let h = Harness::new();
    let bill = h
        .store
        .add_classification(ClassificationKind::PropositionType, &["139"]);
    let mut unmapped = upstream_proposition("3", Vec::new());
    unmapped.type_code = "999".to_string();
    h.source.add_proposition(upstream_proposition("1", Vec::new()));
    h.source.add_proposition(unmapped);
    let aggregator = h.aggregator(SyncConfig {
        economy_mode: true,
        ..config(true)
    });

    for code in ["1", "3"] {
        let outcome = aggregator
            .pipeline()
            .process(ItemKind::Proposition, &Code::from(code))
            .await?;
        assert_eq!(outcome, ItemOutcome::Registered);
    }

    let stored = h.store.propositions();
    let curated = stored.iter().find(|p| p.value.code.as_str() == "1").unwrap();
    let fallback = stored.iter().find(|p| p.value.code.as_str() == "3").unwrap();
    assert_eq!(curated.value.type_id, bill);

    let illustration = curated.value.illustration.as_ref().unwrap();
    assert_eq!(illustration.image_url, "https://cdn.test/1/1.png");
    assert_eq!(illustration.description, "Ilustração em https://cdn.test/1/1.png");
    assert!(fallback.value.illustration.is_none());
    assert_eq!(h.images.prompts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn drifted_item_is_reported_as_updated() -> Result<()> {
    let h = Harness::new();
    h.store
        .add_classification(ClassificationKind::PropositionType, &["136"]);
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    let aggregator = h.aggregator(config(false));
    let pipeline = aggregator.pipeline();
    pipeline
        .process(ItemKind::Proposition, &Code::from("2345678"))
        .await?;

    let mut drifted = upstream_proposition("2345678", Vec::new());
    drifted.type_code = "136".to_string();
    h.source.add_proposition(drifted);
    pipeline.resolver().reset_memo();

    let outcome = pipeline
        .process(ItemKind::Proposition, &Code::from("2345678"))
        .await?;

    assert_eq!(outcome, ItemOutcome::Updated);
    assert_eq!(h.store.writes(EntityKind::Proposition), 2);
    assert_eq!(h.store.propositions().len(), 1);
    Ok(())
}
