#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use interfaces::defs::{Article, Id, PropositionDraft, RegisteredArticle};
use interfaces::upstream::{
    UpstreamAgendaItem, UpstreamAuthor, UpstreamDeputy, UpstreamEvent, UpstreamLegislativeBody,
    UpstreamParty, UpstreamProposition, UpstreamVoting,
};
use interfaces::Code;
use legislative_sync::config::SyncConfig;
use legislative_sync::llm_adapter::Summarizer;
use legislative_sync::processing::{Enricher, Illustrator};
use legislative_sync::store::MemoryStore;
use legislative_sync::testing::{
    FakeSource, MockExtractor, MockImageGenerator, MockObjectStorage, MockTextModel, MockVisionModel,
};
use legislative_sync::{Collaborators, DependencyResolver, LegislativeAggregator};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Reference day used across the suite (a Friday).
pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

/// Midday of the reference day in Brasília, plus `minutes`.
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

pub fn text_url(code: &str) -> String {
    format!("https://www.camara.leg.br/proposicoesWeb/prop_mostrarintegra?codteor={}", code)
}

pub fn upstream_proposition(code: &str, authors: Vec<UpstreamAuthor>) -> UpstreamProposition {
    UpstreamProposition {
        code: Code::from(code),
        type_code: "139".to_string(),
        specific_type: "Projeto de Lei".to_string(),
        summary: format!("Dispõe sobre a matéria {}", code),
        submitted_at: at(0),
        original_text_url: Some(text_url(code)),
        authors,
    }
}

pub fn deputy_author(code: &str) -> UpstreamAuthor {
    UpstreamAuthor::Deputy { code: Code::from(code) }
}

pub fn upstream_deputy(code: &str, party_acronym: &str) -> UpstreamDeputy {
    UpstreamDeputy {
        code: Code::from(code),
        name: format!("Deputada {}", code),
        electoral_name: format!("Dep. {}", code),
        image_url: format!("https://www.camara.leg.br/internet/deputado/bandep/{}.jpg", code),
        party_acronym: party_acronym.to_string(),
        federated_unit: "SP".to_string(),
    }
}

pub fn upstream_party(code: &str, acronym: &str) -> UpstreamParty {
    UpstreamParty {
        code: Code::from(code),
        name: format!("Partido {}", acronym),
        acronym: acronym.to_string(),
        image_url: None,
    }
}

pub fn upstream_body(code: &str, acronym: &str) -> UpstreamLegislativeBody {
    UpstreamLegislativeBody {
        code: Code::from(code),
        name: format!("Comissão {}", acronym),
        acronym: acronym.to_string(),
    }
}

pub fn upstream_event(code: &str) -> UpstreamEvent {
    UpstreamEvent {
        code: Code::from(code),
        title: "Reunião Deliberativa".to_string(),
        description: "Discussão e votação de propostas".to_string(),
        starts_at: at(0),
        ends_at: None,
        location: "Plenário 1".to_string(),
        is_internal: false,
        video_url: None,
        type_code: Some("110".to_string()),
        situation: Some("Convocada".to_string()),
        legislative_bodies: vec![Code::from("2003")],
        requirements: Vec::new(),
        agenda: Vec::new(),
    }
}

pub fn agenda_item(title: &str) -> UpstreamAgendaItem {
    UpstreamAgendaItem {
        title: title.to_string(),
        topic: "Educação".to_string(),
        regime_code: Some("99".to_string()),
        rapporteur: None,
        proposition: None,
        related_proposition: None,
        voting: None,
        situation: None,
    }
}

pub fn upstream_voting(code: &str) -> UpstreamVoting {
    UpstreamVoting {
        code: Code::from(code),
        description: "Aprovado o requerimento".to_string(),
        result_at: at(30),
        approved: Some(true),
        legislative_body: Some(Code::from("2003")),
        main_proposition: None,
        related_propositions: Vec::new(),
        affected_propositions: Vec::new(),
    }
}

/// Registers a proposition article directly, bypassing enrichment.
pub async fn seed_proposition(
    store: &MemoryStore,
    code: &str,
    type_id: Id,
    submitted_at: DateTime<Utc>,
) -> RegisteredArticle {
    use legislative_sync::store::Store;

    let proposition = PropositionDraft {
        code: Some(Code::from(code)),
        original_text_url: text_url(code),
        original_text_mime_type: "application/pdf".to_string(),
        title: format!("Proposta {}", code),
        summary: format!("Resumo da proposta {}", code),
        submitted_at: Some(submitted_at),
        specific_type: "Projeto de Lei".to_string(),
        type_id: Some(type_id),
        ..Default::default()
    }
    .build()
    .unwrap();
    store.register_article(&Article::proposition(proposition)).await.unwrap()
}

/// Every collaborator as a test double, plus the upstream records most
/// tests need: party PT, deputy 204554 and legislative body 2003.
pub struct Harness {
    pub source: Arc<FakeSource>,
    pub store: Arc<MemoryStore>,
    pub text: Arc<MockTextModel>,
    pub extractor: Arc<MockExtractor>,
    pub images: Arc<MockImageGenerator>,
    pub vision: Arc<MockVisionModel>,
    pub storage: Arc<MockObjectStorage>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let source = FakeSource::new();
        source.add_party(upstream_party("36844", "PT"));
        source.add_deputy(upstream_deputy("204554", "PT"));
        source.add_legislative_body(upstream_body("2003", "CCJC"));

        Self {
            source: Arc::new(source),
            store: Arc::new(MemoryStore::new()),
            text: Arc::new(MockTextModel::new()),
            extractor: Arc::new(MockExtractor::new()),
            images: Arc::new(MockImageGenerator::new()),
            vision: Arc::new(MockVisionModel::new()),
            storage: Arc::new(MockObjectStorage::new()),
        }
    }

    pub fn summarizer(&self) -> Summarizer {
        Summarizer::new(self.text.clone(), 4_000, Duration::ZERO)
    }

    pub fn illustrator(&self) -> Illustrator {
        Illustrator::new(self.images.clone(), self.vision.clone(), self.storage.clone())
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            source: self.source.clone(),
            store: self.store.clone(),
            summarizer: self.summarizer(),
            extractor: self.extractor.clone(),
            illustrator: Some(self.illustrator()),
        }
    }

    pub fn aggregator(&self, config: SyncConfig) -> LegislativeAggregator {
        LegislativeAggregator::new(self.collaborators(), config, 100)
    }

    /// Resolver without illustration.
    pub fn resolver(&self) -> DependencyResolver {
        let enricher = Enricher::new(self.extractor.clone(), self.summarizer(), None, false);
        DependencyResolver::new(self.source.clone(), self.store.clone(), enricher)
    }
}
