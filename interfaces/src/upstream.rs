//! Records as the upstream service reports them, before any local
//! identifiers are resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defs::Code;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamAuthor {
    Deputy { code: Code },
    External { name: String, type_code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamProposition {
    pub code: Code,
    pub type_code: String,
    pub specific_type: String,
    pub summary: String,
    pub submitted_at: DateTime<Utc>,
    pub original_text_url: Option<String>,
    pub authors: Vec<UpstreamAuthor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDeputy {
    pub code: Code,
    pub name: String,
    pub electoral_name: String,
    pub image_url: String,
    pub party_acronym: String,
    pub federated_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamParty {
    pub code: Code,
    pub name: String,
    pub acronym: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamLegislativeBody {
    pub code: Code,
    pub name: String,
    pub acronym: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamAgendaItem {
    pub title: String,
    pub topic: String,
    pub regime_code: Option<String>,
    pub rapporteur: Option<Code>,
    pub proposition: Option<Code>,
    pub related_proposition: Option<Code>,
    pub voting: Option<Code>,
    pub situation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamEvent {
    pub code: Code,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: String,
    pub is_internal: bool,
    pub video_url: Option<String>,
    pub type_code: Option<String>,
    pub situation: Option<String>,
    pub legislative_bodies: Vec<Code>,
    pub requirements: Vec<Code>,
    pub agenda: Vec<UpstreamAgendaItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamVoting {
    pub code: Code,
    pub description: String,
    pub result_at: DateTime<Utc>,
    pub approved: Option<bool>,
    pub legislative_body: Option<Code>,
    pub main_proposition: Option<Code>,
    pub related_propositions: Vec<Code>,
    pub affected_propositions: Vec<Code>,
}
