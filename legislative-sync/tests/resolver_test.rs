mod common;

use common::*;
use interfaces::defs::{AuthorRef, ClassificationKind, EntityKind};
use interfaces::upstream::UpstreamAuthor;
use interfaces::Code;
use legislative_sync::store::Upserted;
use legislative_sync::types::{Result, SyncError};
use tokio_test::assert_err;

#[tokio::test]
async fn proposition_is_registered_once_across_runs() -> Result<()> {
    let h = Harness::new();
    h.source
        .add_proposition(upstream_proposition("2345678", vec![deputy_author("204554")]));
    let resolver = h.resolver();

    let first = resolver.resolve_proposition(&Code::from("2345678")).await?;
    assert!(matches!(first, Upserted::Created(_)));
    let writes = h.store.total_writes();
    assert_eq!(writes, 3, "party, deputy and proposition");

    resolver.reset_memo();
    let second = resolver.resolve_proposition(&Code::from("2345678")).await?;
    assert_eq!(second, Upserted::Unchanged(first.id()));
    assert_eq!(h.store.total_writes(), writes);
    assert_eq!(h.store.propositions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn registered_proposition_carries_generated_content() -> Result<()> {
    let h = Harness::new();
    h.source
        .add_proposition(upstream_proposition("2345678", vec![deputy_author("204554")]));
    h.extractor.set_document(
        &text_url("2345678"),
        "Art. 1º Esta lei institui o programa nacional de leitura.",
        "application/pdf",
    );

    h.resolver().resolve_proposition(&Code::from("2345678")).await?;

    let stored = &h.store.propositions()[0].value;
    assert_eq!(stored.original_text_url, text_url("2345678"));
    assert_eq!(stored.original_text_mime_type, "application/pdf");
    assert!(stored.summary.starts_with("[proposition summary] Art. 1º"));
    assert!(stored.title.starts_with("[proposition title]"));
    assert!(stored.illustration.is_none());

    let deputy_id = h.store.deputies()[0].id;
    assert_eq!(stored.authors, vec![AuthorRef::Deputy(deputy_id)]);
    Ok(())
}

#[tokio::test]
async fn drifted_classification_is_updated_in_place() -> Result<()> {
    let h = Harness::new();
    let pec = h
        .store
        .add_classification(ClassificationKind::PropositionType, &["136"]);
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    let resolver = h.resolver();
    let registered = resolver.resolve_proposition(&Code::from("2345678")).await?;

    let mut drifted = upstream_proposition("2345678", Vec::new());
    drifted.type_code = "136".to_string();
    drifted.specific_type = "Proposta de Emenda à Constituição".to_string();
    h.source.add_proposition(drifted);

    resolver.reset_memo();
    let refreshed = resolver.resolve_proposition(&Code::from("2345678")).await?;
    assert_eq!(refreshed, Upserted::Updated(registered.id()));

    let stored = &h.store.propositions()[0].value;
    assert_eq!(stored.type_id, pec);
    assert_eq!(stored.specific_type, "Proposta de Emenda à Constituição");
    assert_eq!(h.extractor.calls(&text_url("2345678")), 1, "refresh does not re-enrich");
    Ok(())
}

#[tokio::test]
async fn party_acronyms_are_normalized_before_lookup() -> Result<()> {
    let h = Harness::new();
    h.source.add_deputy(upstream_deputy("160511", " pt*"));
    let resolver = h.resolver();

    resolver.resolve_deputy(&Code::from("204554")).await?;
    resolver.resolve_deputy(&Code::from("160511")).await?;

    let parties = h.store.parties();
    assert_eq!(parties.len(), 1);
    assert_eq!(parties[0].value.acronym, "PT");
    let deputies = h.store.deputies();
    assert_eq!(deputies.len(), 2);
    assert!(deputies.iter().all(|d| d.value.party_id == parties[0].id));
    Ok(())
}

#[tokio::test]
async fn party_switch_updates_the_deputy_in_place() -> Result<()> {
    let h = Harness::new();
    h.source.add_party(upstream_party("37905", "PSOL"));
    let resolver = h.resolver();
    let id = resolver.resolve_deputy(&Code::from("204554")).await?;
    let before = h.store.deputies()[0].value.party_id;

    h.source.add_deputy(upstream_deputy("204554", "PSOL"));
    resolver.reset_memo();
    assert_eq!(resolver.resolve_deputy(&Code::from("204554")).await?, id);

    let deputies = h.store.deputies();
    assert_eq!(deputies.len(), 1);
    assert_ne!(deputies[0].value.party_id, before);
    let psol = h.store.parties().into_iter().find(|p| p.value.acronym == "PSOL").unwrap();
    assert_eq!(deputies[0].value.party_id, psol.id);
    assert_eq!(h.store.writes(EntityKind::Deputy), 2);
    Ok(())
}

#[tokio::test]
async fn shared_dependencies_are_fetched_once_per_run() -> Result<()> {
    let h = Harness::new();
    h.source
        .add_proposition(upstream_proposition("1", vec![deputy_author("204554")]));
    h.source
        .add_proposition(upstream_proposition("2", vec![deputy_author("204554")]));
    let resolver = h.resolver();

    resolver.resolve_proposition(&Code::from("1")).await?;
    resolver.resolve_proposition(&Code::from("2")).await?;

    assert_eq!(h.source.fetches(EntityKind::Deputy, "204554"), 1);
    assert_eq!(h.source.fetches(EntityKind::Party, "PT"), 1);
    assert_eq!(h.store.writes(EntityKind::Deputy), 1);
    Ok(())
}

#[tokio::test]
async fn losing_a_registration_race_returns_the_winner() -> Result<()> {
    let h = Harness::new();
    h.source.add_proposition(upstream_proposition("2345678", Vec::new()));
    let resolver = h.resolver();
    let winner = resolver.resolve_proposition(&Code::from("2345678")).await?;

    resolver.reset_memo();
    h.store.hide_next_lookup(EntityKind::Proposition);
    let loser = resolver.resolve_proposition(&Code::from("2345678")).await?;

    assert_eq!(loser, Upserted::Unchanged(winner.id()));
    assert_eq!(h.store.propositions().len(), 1);
    assert_eq!(h.store.writes(EntityKind::Proposition), 1);
    Ok(())
}

#[tokio::test]
async fn external_authors_get_their_type_classification() -> Result<()> {
    let h = Harness::new();
    let executive = h
        .store
        .add_classification(ClassificationKind::ExternalAuthorType, &["1"]);
    h.source.add_proposition(upstream_proposition(
        "2345678",
        vec![UpstreamAuthor::External {
            name: " Poder Executivo ".to_string(),
            type_code: "1".to_string(),
        }],
    ));

    h.resolver().resolve_proposition(&Code::from("2345678")).await?;

    let authors = h.store.external_authors();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].value.name, "Poder Executivo");
    assert_eq!(authors[0].value.type_id, executive);
    Ok(())
}

#[tokio::test]
async fn deputy_without_party_is_rejected() {
    let h = Harness::new();
    h.source.add_deputy(upstream_deputy("74646", ""));

    let err = assert_err!(h.resolver().resolve_deputy(&Code::from("74646")).await);
    match err {
        SyncError::Validation(e) => assert!(e.has_field("party_id")),
        other => panic!("unexpected error: {}", other),
    }
    assert!(h.store.deputies().is_empty());
}

#[tokio::test]
async fn missing_original_text_is_remembered_as_no_content() {
    let h = Harness::new();
    let mut proposition = upstream_proposition("2345678", Vec::new());
    proposition.original_text_url = None;
    h.source.add_proposition(proposition);
    let resolver = h.resolver();

    for _ in 0..2 {
        let err = assert_err!(resolver.resolve_proposition(&Code::from("2345678")).await);
        assert!(err.is_no_content());
    }
    assert_eq!(h.source.fetches(EntityKind::Proposition, "2345678"), 1);
    assert_eq!(h.store.total_writes(), 0);
}
