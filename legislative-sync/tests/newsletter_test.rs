mod common;

use common::*;
use interfaces::defs::{ClassificationKind, Id};
use legislative_sync::config::SyncConfig;
use legislative_sync::store::Store;
use legislative_sync::types::Result;
use legislative_sync::NewsletterOutcome;

struct Types {
    specific: Id,
    fallback: Id,
}

fn types(h: &Harness) -> Types {
    Types {
        specific: h
            .store
            .add_classification(ClassificationKind::PropositionType, &["139"]),
        fallback: h
            .store
            .default_classification(ClassificationKind::PropositionType)
            .unwrap(),
    }
}

#[tokio::test]
async fn specific_types_win_the_ten_slots() -> Result<()> {
    let h = Harness::new();
    let types = types(&h);
    let mut specific = Vec::new();
    let mut fallback = Vec::new();
    for i in 0..15 {
        let code = format!("{}", 1000 + i);
        // alternate so both groups are spread over the day
        if i % 5 < 3 {
            specific.push(seed_proposition(&h.store, &code, types.specific, at(i)).await.article_id);
        } else {
            fallback.push(seed_proposition(&h.store, &code, types.fallback, at(i)).await.article_id);
        }
    }
    assert_eq!(specific.len(), 9);
    assert_eq!(fallback.len(), 6);

    let aggregator = h.aggregator(SyncConfig::default());
    let outcome = aggregator.newsletter().build_for(day()).await?;
    assert!(matches!(outcome, NewsletterOutcome::Created { articles: 10, .. }));

    let newsletter = &h.store.newsletters()[0].value;
    assert_eq!(newsletter.reference_date, day());
    assert_eq!(newsletter.articles.len(), 10);
    let mut expected = specific.clone();
    expected.push(fallback[0]);
    assert_eq!(newsletter.articles, expected, "specific in order, then the earliest fallback");
    Ok(())
}

#[tokio::test]
async fn digest_title_is_written_from_the_description() -> Result<()> {
    let h = Harness::new();
    let types = types(&h);
    seed_proposition(&h.store, "1001", types.specific, at(0)).await;
    let aggregator = h.aggregator(SyncConfig::default());

    aggregator.newsletter().build_for(day()).await?;

    let calls = h.text.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].purpose, "newsletter description");
    assert!(calls[0].text.starts_with("Proposta 1001\nResumo da proposta 1001"));
    assert_eq!(calls[1].purpose, "newsletter title");
    assert_eq!(calls[1].text, calls[0].response);

    let newsletter = &h.store.newsletters()[0].value;
    assert_eq!(newsletter.description, calls[0].response);
    assert_eq!(newsletter.title, calls[1].response);
    Ok(())
}

#[tokio::test]
async fn later_articles_are_appended_and_digest_regenerated() -> Result<()> {
    let h = Harness::new();
    let types = types(&h);
    for i in 0..3 {
        seed_proposition(&h.store, &format!("{}", 1000 + i), types.specific, at(i)).await;
    }
    let aggregator = h.aggregator(SyncConfig::default());
    aggregator.newsletter().build_for(day()).await?;

    let late = seed_proposition(&h.store, "2000", types.fallback, at(300)).await;
    let outcome = aggregator.newsletter().build_for(day()).await?;
    assert!(matches!(outcome, NewsletterOutcome::Appended { added: 1, .. }));

    let stored = h.store.find_newsletter(day()).await?.unwrap();
    assert_eq!(stored.articles.len(), 4);
    assert!(stored.articles.contains(&late.article_id));
    assert_eq!(h.text.calls_for("newsletter description"), 2);
    let digest_input = &h.text.calls()[2].text;
    assert!(digest_input.contains("Proposta 1000") && digest_input.contains("Proposta 2000"));
    assert_eq!(stored.description, h.text.calls()[2].response);
    assert_eq!(h.store.newsletters().len(), 1);
    Ok(())
}

#[tokio::test]
async fn rebuilding_without_new_articles_changes_nothing() -> Result<()> {
    let h = Harness::new();
    let types = types(&h);
    seed_proposition(&h.store, "1001", types.specific, at(0)).await;
    let aggregator = h.aggregator(SyncConfig::default());
    aggregator.newsletter().build_for(day()).await?;
    let writes = h.store.total_writes();

    let outcome = aggregator.newsletter().build_for(day()).await?;
    assert!(matches!(outcome, NewsletterOutcome::Unchanged { .. }));
    assert_eq!(h.store.total_writes(), writes);
    assert_eq!(h.text.calls().len(), 2);
    Ok(())
}

#[tokio::test]
async fn full_newsletter_takes_no_more_articles() -> Result<()> {
    let h = Harness::new();
    let types = types(&h);
    for i in 0..3 {
        seed_proposition(&h.store, &format!("{}", 1000 + i), types.specific, at(i)).await;
    }
    let aggregator = h.aggregator(SyncConfig {
        newsletter_max_articles: 3,
        ..SyncConfig::default()
    });
    aggregator.newsletter().build_for(day()).await?;

    seed_proposition(&h.store, "2000", types.specific, at(60)).await;
    let outcome = aggregator.newsletter().build_for(day()).await?;
    assert!(matches!(outcome, NewsletterOutcome::Unchanged { .. }));
    assert_eq!(h.store.newsletters()[0].value.articles.len(), 3);
    Ok(())
}

#[tokio::test]
async fn articles_of_other_days_are_ignored() -> Result<()> {
    let h = Harness::new();
    let types = types(&h);
    // 01:00 in Brasília on the next day
    seed_proposition(&h.store, "1001", types.specific, at(13 * 60)).await;
    let aggregator = h.aggregator(SyncConfig::default());

    let outcome = aggregator.newsletter().build_for(day()).await?;
    assert_eq!(outcome, NewsletterOutcome::NoArticles);
    assert!(h.store.newsletters().is_empty());
    assert!(h.text.calls().is_empty());
    Ok(())
}
