mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use interfaces::defs::{ClassificationKind, ItemKind};
use interfaces::Code;
use legislative_sync::discovery::diff;
use legislative_sync::testing::FakeSource;
use legislative_sync::types::Result;
use legislative_sync::{CodeDiscovery, ReconciliationEngine};
use proptest::prelude::*;

fn codes(range: std::ops::Range<i64>) -> Vec<Code> {
    range.map(Code::from).collect()
}

#[tokio::test]
async fn pages_until_a_short_page() -> Result<()> {
    let source = Arc::new(FakeSource::new());
    source.set_listing(ItemKind::Proposition, &codes(0..250));
    let discovery = CodeDiscovery::new(source.clone(), 100);

    let found = discovery.list_recent_codes(ItemKind::Proposition, day()).await?;

    assert_eq!(found, codes(0..250));
    let pages: Vec<u32> = source.list_calls().iter().map(|(_, _, page)| *page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    assert!(source.list_calls().iter().all(|(kind, since, _)| *kind == ItemKind::Proposition && *since == day()));
    Ok(())
}

#[tokio::test]
async fn exact_multiple_of_page_size_ends_on_an_empty_page() -> Result<()> {
    let source = Arc::new(FakeSource::new());
    source.set_listing(ItemKind::Event, &codes(0..20));
    let discovery = CodeDiscovery::new(source.clone(), 10);

    let found = discovery.list_recent_codes(ItemKind::Event, day()).await?;

    assert_eq!(found.len(), 20);
    assert_eq!(source.list_calls().len(), 3);
    Ok(())
}

#[tokio::test]
async fn empty_listing_discovers_nothing() -> Result<()> {
    let source = Arc::new(FakeSource::new());
    let discovery = CodeDiscovery::new(source.clone(), 100);

    assert!(discovery.list_recent_codes(ItemKind::Voting, day()).await?.is_empty());
    assert_eq!(source.list_calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn reconciliation_returns_only_unregistered_codes() -> Result<()> {
    let h = Harness::new();
    let fallback = h
        .store
        .default_classification(ClassificationKind::PropositionType)
        .unwrap();
    seed_proposition(&h.store, "101", fallback, at(0)).await;
    let engine = ReconciliationEngine::new(h.store.clone());

    let discovered = vec![Code::from("101"), Code::from("102"), Code::from("103"), Code::from("102")];
    let new = engine.new_codes(ItemKind::Proposition, &discovered).await?;

    assert_eq!(new, vec![Code::from("102"), Code::from("103")]);
    assert!(engine.new_codes(ItemKind::Voting, &[]).await?.is_empty());
    Ok(())
}

proptest! {
    #[test]
    fn diff_is_the_ordered_set_difference(
        discovered in prop::collection::vec(0i64..50, 0..60),
        registered in prop::collection::hash_set(0i64..50, 0..30),
    ) {
        let discovered: Vec<Code> = discovered.into_iter().map(Code::from).collect();
        let registered: HashSet<Code> = registered.into_iter().map(Code::from).collect();

        let new = diff(&discovered, &registered);

        let unique: HashSet<&Code> = new.iter().collect();
        prop_assert_eq!(unique.len(), new.len());
        for code in &new {
            prop_assert!(!registered.contains(code));
        }
        for code in &discovered {
            prop_assert!(registered.contains(code) || new.contains(code));
        }
        let positions: Vec<usize> = new
            .iter()
            .map(|code| discovered.iter().position(|d| d == code).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
