use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{ValidationError, Validator};

/// Surrogate identifier, assigned by the store when a row is inserted.
pub type Id = i64;

/// Identifier assigned by the upstream legislative-data service.
///
/// Upstream codes are integers for most kinds and strings for votings, so
/// they are kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for Code {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Code {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Code {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Kinds of items the upstream service lists incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Proposition,
    Voting,
    Event,
}

impl ItemKind {
    /// Discovery order within one run: events reference votings and
    /// propositions, so those are picked up first.
    pub const ALL: [ItemKind; 3] = [ItemKind::Proposition, ItemKind::Voting, ItemKind::Event];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Proposition => "proposition",
            ItemKind::Voting => "voting",
            ItemKind::Event => "event",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Party,
    Deputy,
    ExternalAuthor,
    LegislativeBody,
    Proposition,
    Event,
    Voting,
    Newsletter,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Party => "party",
            EntityKind::Deputy => "deputy",
            EntityKind::ExternalAuthor => "external_author",
            EntityKind::LegislativeBody => "legislative_body",
            EntityKind::Proposition => "proposition",
            EntityKind::Event => "event",
            EntityKind::Voting => "voting",
            EntityKind::Newsletter => "newsletter",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ItemKind> for EntityKind {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Proposition => EntityKind::Proposition,
            ItemKind::Voting => EntityKind::Voting,
            ItemKind::Event => EntityKind::Event,
        }
    }
}

/// Lookup tables mapping upstream codes to curated classification rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationKind {
    PropositionType,
    EventType,
    EventSituation,
    AgendaRegime,
    ExternalAuthorType,
}

impl ClassificationKind {
    pub const ALL: [ClassificationKind; 5] = [
        ClassificationKind::PropositionType,
        ClassificationKind::EventType,
        ClassificationKind::EventSituation,
        ClassificationKind::AgendaRegime,
        ClassificationKind::ExternalAuthorType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationKind::PropositionType => "proposition_type",
            ClassificationKind::EventType => "event_type",
            ClassificationKind::EventSituation => "event_situation",
            ClassificationKind::AgendaRegime => "agenda_regime",
            ClassificationKind::ExternalAuthorType => "external_author_type",
        }
    }
}

impl fmt::Display for ClassificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        ClassificationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown classification kind: {}", s))
    }
}

/// A resolved classification row. `is_default` marks the catch-all row used
/// when no curated code matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub id: Id,
    pub is_default: bool,
}

/// A value object persisted under a natural key.
pub trait Entity: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;
    type Key: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub code: Code,
    pub name: String,
    pub acronym: String,
    pub image_url: Option<String>,
}

impl Party {
    pub fn new(
        code: Code,
        name: impl Into<String>,
        acronym: impl Into<String>,
        image_url: Option<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let acronym = acronym.into();
        let mut v = Validator::new("party");
        v.text("code", code.as_str());
        v.text("name", &name);
        v.text("acronym", &acronym);
        v.optional_url("image_url", image_url.as_deref());
        v.finish(|| {
            Some(Self {
                code,
                name,
                acronym,
                image_url,
            })
        })
    }
}

impl Entity for Party {
    const KIND: EntityKind = EntityKind::Party;
    type Key = String;

    fn key(&self) -> String {
        self.acronym.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deputy {
    pub code: Code,
    pub name: String,
    pub electoral_name: String,
    pub image_url: String,
    pub party_id: Id,
    pub federated_unit: String,
}

impl Deputy {
    pub fn new(
        code: Code,
        name: impl Into<String>,
        electoral_name: impl Into<String>,
        image_url: impl Into<String>,
        party_id: Option<Id>,
        federated_unit: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let electoral_name = electoral_name.into();
        let image_url = image_url.into();
        let federated_unit = federated_unit.into().trim().to_uppercase();
        let mut v = Validator::new("deputy");
        v.text("code", code.as_str());
        v.text("name", &name);
        v.text("electoral_name", &electoral_name);
        v.url("image_url", &image_url);
        let party_id = v.required("party_id", party_id);
        v.check(
            "federated_unit",
            federated_unit.len() == 2 && federated_unit.chars().all(|c| c.is_ascii_uppercase()),
            "must be a two-letter state code",
        );
        v.finish(|| {
            Some(Self {
                code,
                name,
                electoral_name,
                image_url,
                party_id: party_id?,
                federated_unit,
            })
        })
    }
}

impl Entity for Deputy {
    const KIND: EntityKind = EntityKind::Deputy;
    type Key = Code;

    fn key(&self) -> Code {
        self.code.clone()
    }
}

/// An author that is not a sitting deputy (the executive, a committee, a
/// citizen initiative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAuthor {
    pub name: String,
    pub type_id: Id,
}

impl ExternalAuthor {
    pub fn new(name: impl Into<String>, type_id: Id) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        let mut v = Validator::new("external author");
        v.text("name", &name);
        v.finish(|| Some(Self { name, type_id }))
    }
}

impl Entity for ExternalAuthor {
    const KIND: EntityKind = EntityKind::ExternalAuthor;
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegislativeBody {
    pub code: Code,
    pub name: String,
    pub acronym: String,
}

impl LegislativeBody {
    pub fn new(
        code: Code,
        name: impl Into<String>,
        acronym: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let acronym = acronym.into();
        let mut v = Validator::new("legislative body");
        v.text("code", code.as_str());
        v.text("name", &name);
        v.text("acronym", &acronym);
        v.finish(|| Some(Self { code, name, acronym }))
    }
}

impl Entity for LegislativeBody {
    const KIND: EntityKind = EntityKind::LegislativeBody;
    type Key = Code;

    fn key(&self) -> Code {
        self.code.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorRef {
    Deputy(Id),
    External(Id),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Illustration {
    pub image_url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposition {
    pub code: Code,
    pub original_text_url: String,
    pub original_text_mime_type: String,
    pub title: String,
    pub summary: String,
    pub submitted_at: DateTime<Utc>,
    pub illustration: Option<Illustration>,
    pub specific_type: String,
    pub type_id: Id,
    pub authors: Vec<AuthorRef>,
}

/// Unchecked proposition fields, turned into a [`Proposition`] by `build`.
#[derive(Debug, Clone, Default)]
pub struct PropositionDraft {
    pub code: Option<Code>,
    pub original_text_url: String,
    pub original_text_mime_type: String,
    pub title: String,
    pub summary: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub illustration: Option<Illustration>,
    pub specific_type: String,
    pub type_id: Option<Id>,
    pub authors: Vec<AuthorRef>,
}

impl PropositionDraft {
    pub fn build(self) -> Result<Proposition, ValidationError> {
        let mut v = Validator::new("proposition");
        let code = v.required("code", self.code.filter(|c| !c.is_empty()));
        v.url("original_text_url", &self.original_text_url);
        v.text("original_text_mime_type", &self.original_text_mime_type);
        v.text("title", &self.title);
        v.text("summary", &self.summary);
        let submitted_at = v.required("submitted_at", self.submitted_at);
        if let Some(illustration) = &self.illustration {
            v.url("image_url", &illustration.image_url);
            v.text("image_description", &illustration.description);
        }
        let type_id = v.required("type_id", self.type_id);
        v.finish(|| {
            Some(Proposition {
                code: code?,
                original_text_url: self.original_text_url,
                original_text_mime_type: self.original_text_mime_type,
                title: self.title,
                summary: self.summary,
                submitted_at: submitted_at?,
                illustration: self.illustration,
                specific_type: self.specific_type,
                type_id: type_id?,
                authors: self.authors,
            })
        })
    }
}

/// The part of a stored proposition a re-fetch may find drifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropositionClassification {
    pub type_id: Id,
    pub specific_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAgendaItem {
    pub title: String,
    pub topic: String,
    pub regime_id: Id,
    pub rapporteur_id: Option<Id>,
    pub proposition_id: Option<Id>,
    pub related_proposition_id: Option<Id>,
    pub voting_id: Option<Id>,
    pub situation: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AgendaItemDraft {
    pub title: String,
    pub topic: String,
    pub regime_id: Option<Id>,
    pub rapporteur_id: Option<Id>,
    pub proposition_id: Option<Id>,
    pub related_proposition_id: Option<Id>,
    pub voting_id: Option<Id>,
    pub situation: Option<String>,
}

impl AgendaItemDraft {
    pub fn build(self) -> Result<EventAgendaItem, ValidationError> {
        let mut v = Validator::new("agenda item");
        v.text("title", &self.title);
        let regime_id = v.required("regime_id", self.regime_id);
        v.finish(|| {
            Some(EventAgendaItem {
                title: self.title,
                topic: self.topic,
                regime_id: regime_id?,
                rapporteur_id: self.rapporteur_id,
                proposition_id: self.proposition_id,
                related_proposition_id: self.related_proposition_id,
                voting_id: self.voting_id,
                situation: self.situation.filter(|s| !s.trim().is_empty()),
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub code: Code,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: String,
    pub is_internal: bool,
    pub video_url: Option<String>,
    pub type_id: Id,
    pub situation_id: Id,
    pub legislative_bodies: Vec<Id>,
    pub requirements: Vec<Id>,
    pub agenda: Vec<EventAgendaItem>,
}

impl Event {
    pub fn schedule(&self) -> EventSchedule {
        EventSchedule {
            situation_id: self.situation_id,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub code: Option<Code>,
    pub title: String,
    pub description: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: String,
    pub is_internal: bool,
    pub video_url: Option<String>,
    pub type_id: Option<Id>,
    pub situation_id: Option<Id>,
    pub legislative_bodies: Vec<Id>,
    pub requirements: Vec<Id>,
    pub agenda: Vec<AgendaItemDraft>,
}

impl EventDraft {
    pub fn build(self) -> Result<Event, ValidationError> {
        let mut v = Validator::new("event");
        let code = v.required("code", self.code.filter(|c| !c.is_empty()));
        v.text("title", &self.title);
        v.text("description", &self.description);
        let starts_at = v.required("starts_at", self.starts_at);
        if let (Some(starts_at), Some(ends_at)) = (starts_at, self.ends_at) {
            v.check("ends_at", ends_at >= starts_at, "must not precede starts_at");
        }
        v.optional_url("video_url", self.video_url.as_deref());
        let type_id = v.required("type_id", self.type_id);
        let situation_id = v.required("situation_id", self.situation_id);

        let mut agenda = Vec::with_capacity(self.agenda.len());
        for (i, item) in self.agenda.into_iter().enumerate() {
            if let Some(item) = v.nested(&format!("agenda[{}]", i), item.build()) {
                agenda.push(item);
            }
        }

        v.finish(|| {
            Some(Event {
                code: code?,
                title: self.title,
                description: self.description,
                starts_at: starts_at?,
                ends_at: self.ends_at,
                location: self.location,
                is_internal: self.is_internal,
                video_url: self.video_url,
                type_id: type_id?,
                situation_id: situation_id?,
                legislative_bodies: self.legislative_bodies,
                requirements: self.requirements,
                agenda,
            })
        })
    }
}

/// The part of a stored event a re-fetch may find drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSchedule {
    pub situation_id: Id,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voting {
    pub code: Code,
    pub result_description: String,
    pub result_at: DateTime<Utc>,
    pub approved: bool,
    pub legislative_body_id: Id,
    pub main_proposition_id: Option<Id>,
    pub related_propositions: Vec<Id>,
    pub affected_propositions: Vec<Id>,
}

#[derive(Debug, Clone, Default)]
pub struct VotingDraft {
    pub code: Option<Code>,
    pub result_description: String,
    pub result_at: Option<DateTime<Utc>>,
    pub approved: bool,
    pub legislative_body_id: Option<Id>,
    pub main_proposition_id: Option<Id>,
    pub related_propositions: Vec<Id>,
    pub affected_propositions: Vec<Id>,
}

impl VotingDraft {
    pub fn build(self) -> Result<Voting, ValidationError> {
        let mut v = Validator::new("voting");
        let code = v.required("code", self.code.filter(|c| !c.is_empty()));
        v.text("result_description", &self.result_description);
        let result_at = v.required("result_at", self.result_at);
        let legislative_body_id = v.required("legislative_body_id", self.legislative_body_id);
        v.finish(|| {
            Some(Voting {
                code: code?,
                result_description: self.result_description,
                result_at: result_at?,
                approved: self.approved,
                legislative_body_id: legislative_body_id?,
                main_proposition_id: self.main_proposition_id,
                related_propositions: self.related_propositions,
                affected_propositions: self.affected_propositions,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Newsletter {
    pub reference_date: NaiveDate,
    pub title: String,
    pub description: String,
    pub articles: Vec<Id>,
}

impl Newsletter {
    pub fn new(
        reference_date: NaiveDate,
        title: impl Into<String>,
        description: impl Into<String>,
        articles: Vec<Id>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        let description = description.into();
        let mut v = Validator::new("newsletter");
        v.text("title", &title);
        v.text("description", &description);
        v.check("articles", !articles.is_empty(), "must reference at least one article");
        v.finish(|| {
            Some(Self {
                reference_date,
                title,
                description,
                articles,
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleKind {
    Proposition,
    Voting,
    Event,
    Newsletter,
}

impl ArticleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleKind::Proposition => "proposition",
            ArticleKind::Voting => "voting",
            ArticleKind::Event => "event",
            ArticleKind::Newsletter => "newsletter",
        }
    }
}

impl fmt::Display for ArticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposition" => Ok(ArticleKind::Proposition),
            "voting" => Ok(ArticleKind::Voting),
            "event" => Ok(ArticleKind::Event),
            "newsletter" => Ok(ArticleKind::Newsletter),
            other => Err(format!("unknown article kind: {}", other)),
        }
    }
}

/// The concrete content carried by an [`Article`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ArticlePayload {
    Proposition(Proposition),
    Voting(Voting),
    Event(Event),
    Newsletter(Newsletter),
}

/// Envelope tying one content item to the metadata shared by all articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub reference_at: DateTime<Utc>,
    pub views: i64,
    pub rating: f64,
    pub payload: ArticlePayload,
}

impl Article {
    pub fn new(payload: ArticlePayload, reference_at: DateTime<Utc>) -> Self {
        Self {
            reference_at,
            views: 0,
            rating: 0.0,
            payload,
        }
    }

    pub fn proposition(proposition: Proposition) -> Self {
        let at = proposition.submitted_at;
        Self::new(ArticlePayload::Proposition(proposition), at)
    }

    pub fn voting(voting: Voting) -> Self {
        let at = voting.result_at;
        Self::new(ArticlePayload::Voting(voting), at)
    }

    pub fn event(event: Event) -> Self {
        let at = event.starts_at;
        Self::new(ArticlePayload::Event(event), at)
    }

    pub fn newsletter(newsletter: Newsletter, reference_at: DateTime<Utc>) -> Self {
        Self::new(ArticlePayload::Newsletter(newsletter), reference_at)
    }

    pub fn kind(&self) -> ArticleKind {
        match &self.payload {
            ArticlePayload::Proposition(_) => ArticleKind::Proposition,
            ArticlePayload::Voting(_) => ArticleKind::Voting,
            ArticlePayload::Event(_) => ArticleKind::Event,
            ArticlePayload::Newsletter(_) => ArticleKind::Newsletter,
        }
    }

    /// Natural code of the payload; newsletters are keyed by date instead.
    pub fn code(&self) -> Option<&Code> {
        match &self.payload {
            ArticlePayload::Proposition(p) => Some(&p.code),
            ArticlePayload::Voting(v) => Some(&v.code),
            ArticlePayload::Event(e) => Some(&e.code),
            ArticlePayload::Newsletter(_) => None,
        }
    }
}

/// Surrogate ids assigned when an article and its payload were registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredArticle {
    pub article_id: Id,
    pub entity_id: Id,
}

/// What the newsletter digest needs to know about one candidate article.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSummary {
    pub article_id: Id,
    pub kind: ArticleKind,
    pub title: String,
    pub content: String,
    pub reference_at: DateTime<Utc>,
    pub has_specific_type: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn proposition_draft_reports_all_missing_fields() {
        let err = PropositionDraft {
            code: Some(Code::from(7)),
            original_text_url: "not a url".to_string(),
            ..Default::default()
        }
        .build()
        .unwrap_err();

        for field in [
            "original_text_url",
            "original_text_mime_type",
            "title",
            "summary",
            "submitted_at",
            "type_id",
        ] {
            assert!(err.has_field(field), "missing {}", field);
        }
        assert!(!err.has_field("code"));
    }

    #[test]
    fn event_rejects_inverted_window_and_bad_agenda() {
        let starts = Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap();
        let err = EventDraft {
            code: Some(Code::from(1)),
            title: "Reunião deliberativa".to_string(),
            description: "Pauta".to_string(),
            starts_at: Some(starts),
            ends_at: Some(starts - chrono::Duration::hours(1)),
            type_id: Some(1),
            situation_id: Some(1),
            agenda: vec![AgendaItemDraft::default()],
            ..Default::default()
        }
        .build()
        .unwrap_err();

        assert!(err.has_field("ends_at"));
        assert!(err.has_field("agenda[0].title"));
        assert!(err.has_field("agenda[0].regime_id"));
    }

    #[test]
    fn article_reference_time_follows_payload() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
        let voting = VotingDraft {
            code: Some(Code::from("2265603-43")),
            result_description: "Aprovado".to_string(),
            result_at: Some(at),
            approved: true,
            legislative_body_id: Some(3),
            ..Default::default()
        }
        .build()
        .unwrap();

        let article = Article::voting(voting);
        assert_eq!(article.kind(), ArticleKind::Voting);
        assert_eq!(article.reference_at, at);
        assert_eq!(article.code().map(Code::as_str), Some("2265603-43"));
    }

    #[test]
    fn deputy_normalizes_state_code() {
        let deputy = Deputy::new(
            Code::from(204554),
            "Fulana de Tal",
            "Fulana",
            "https://www.camara.leg.br/internet/deputado/bandep/204554.jpg",
            Some(2),
            " sp",
        )
        .unwrap();
        assert_eq!(deputy.federated_unit, "SP");
    }
}
