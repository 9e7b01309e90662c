//! Test doubles for the external collaborators.
//!
//! Every double records its calls and can be told to fail the next few
//! calls with a transient error, which is what the retry tests need.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use interfaces::defs::{ClassificationKind, EntityKind, ItemKind};
use interfaces::services::{
    CatalogEntry, ExtractedText, GeneratedImage, ImageGenerator, LegislativeSource, ObjectStorage,
    TextExtractor, TextModel, VisionModel,
};
use interfaces::upstream::{
    UpstreamDeputy, UpstreamEvent, UpstreamLegislativeBody, UpstreamParty, UpstreamProposition,
    UpstreamVoting,
};
use interfaces::{Code, ServiceError, ServiceResult};

use crate::utils::normalize_party_acronym;

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_pending(counter: &Mutex<u32>) -> bool {
    let mut pending = guard(counter);
    if *pending == 0 {
        return false;
    }
    *pending -= 1;
    true
}

/// Decrements a pending failure counter, returning whether this call fails.
fn take_failure<K: std::hash::Hash + Eq>(failures: &Mutex<HashMap<K, u32>>, key: &K) -> bool {
    let mut failures = guard(failures);
    match failures.get_mut(key) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

// =============================================================================
// Fake legislative source
// =============================================================================

/// In-memory upstream. Records are looked up by code; listings are paged
/// the way the real service pages them.
#[derive(Default)]
pub struct FakeSource {
    listings: Mutex<HashMap<ItemKind, Vec<Code>>>,
    propositions: Mutex<HashMap<Code, UpstreamProposition>>,
    deputies: Mutex<HashMap<Code, UpstreamDeputy>>,
    parties: Mutex<HashMap<String, UpstreamParty>>,
    bodies: Mutex<HashMap<Code, UpstreamLegislativeBody>>,
    events: Mutex<HashMap<Code, UpstreamEvent>>,
    votings: Mutex<HashMap<Code, UpstreamVoting>>,
    catalogs: Mutex<HashMap<ClassificationKind, Vec<CatalogEntry>>>,
    failures: Mutex<HashMap<(EntityKind, String), u32>>,
    fetches: Mutex<Vec<(EntityKind, String)>>,
    list_calls: Mutex<Vec<(ItemKind, NaiveDate, u32)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listing(&self, kind: ItemKind, codes: &[Code]) {
        guard(&self.listings).insert(kind, codes.to_vec());
    }

    pub fn add_proposition(&self, proposition: UpstreamProposition) {
        guard(&self.propositions).insert(proposition.code.clone(), proposition);
    }

    pub fn add_deputy(&self, deputy: UpstreamDeputy) {
        guard(&self.deputies).insert(deputy.code.clone(), deputy);
    }

    pub fn add_party(&self, party: UpstreamParty) {
        guard(&self.parties).insert(normalize_party_acronym(&party.acronym), party);
    }

    pub fn add_legislative_body(&self, body: UpstreamLegislativeBody) {
        guard(&self.bodies).insert(body.code.clone(), body);
    }

    pub fn add_event(&self, event: UpstreamEvent) {
        guard(&self.events).insert(event.code.clone(), event);
    }

    pub fn add_voting(&self, voting: UpstreamVoting) {
        guard(&self.votings).insert(voting.code.clone(), voting);
    }

    pub fn set_catalog(&self, kind: ClassificationKind, entries: Vec<CatalogEntry>) {
        guard(&self.catalogs).insert(kind, entries);
    }

    /// Fail the next `n` fetches of one record with a transient error.
    pub fn fail_next(&self, kind: EntityKind, key: &str, n: u32) {
        guard(&self.failures).insert((kind, key.to_string()), n);
    }

    /// Number of detail fetches issued for one record.
    pub fn fetches(&self, kind: EntityKind, key: &str) -> usize {
        guard(&self.fetches)
            .iter()
            .filter(|(k, c)| *k == kind && c == key)
            .count()
    }

    pub fn total_fetches(&self, kind: EntityKind) -> usize {
        guard(&self.fetches).iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn list_calls(&self) -> Vec<(ItemKind, NaiveDate, u32)> {
        guard(&self.list_calls).clone()
    }

    fn lookup<K, V>(&self, kind: EntityKind, table: &Mutex<HashMap<K, V>>, key: &K) -> ServiceResult<V>
    where
        K: std::hash::Hash + Eq + std::fmt::Display,
        V: Clone,
    {
        let name = key.to_string();
        guard(&self.fetches).push((kind, name.clone()));
        if take_failure(&self.failures, &(kind, name.clone())) {
            return Err(ServiceError::Transient(format!("injected failure for {} {}", kind, name)));
        }
        guard(table)
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("{} {}", kind, name)))
    }
}

#[async_trait]
impl LegislativeSource for FakeSource {
    async fn list_recent(
        &self,
        kind: ItemKind,
        since: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> ServiceResult<Vec<Code>> {
        guard(&self.list_calls).push((kind, since, page));
        let listings = guard(&self.listings);
        let all = listings.get(&kind).map(Vec::as_slice).unwrap_or_default();
        let start = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        Ok(all.iter().skip(start).take(page_size as usize).cloned().collect())
    }

    async fn proposition(&self, code: &Code) -> ServiceResult<UpstreamProposition> {
        self.lookup(EntityKind::Proposition, &self.propositions, code)
    }

    async fn deputy(&self, code: &Code) -> ServiceResult<UpstreamDeputy> {
        self.lookup(EntityKind::Deputy, &self.deputies, code)
    }

    async fn party(&self, acronym: &str) -> ServiceResult<UpstreamParty> {
        self.lookup(EntityKind::Party, &self.parties, &normalize_party_acronym(acronym))
    }

    async fn legislative_body(&self, code: &Code) -> ServiceResult<UpstreamLegislativeBody> {
        self.lookup(EntityKind::LegislativeBody, &self.bodies, code)
    }

    async fn event(&self, code: &Code) -> ServiceResult<UpstreamEvent> {
        self.lookup(EntityKind::Event, &self.events, code)
    }

    async fn voting(&self, code: &Code) -> ServiceResult<UpstreamVoting> {
        self.lookup(EntityKind::Voting, &self.votings, code)
    }

    async fn types_catalog(&self, kind: ClassificationKind) -> ServiceResult<Vec<CatalogEntry>> {
        guard(&self.catalogs)
            .get(&kind)
            .cloned()
            .ok_or_else(|| ServiceError::Unsupported(format!("no catalog for {}", kind)))
    }
}

// =============================================================================
// Mock language models
// =============================================================================

/// Arguments and result of one text-model call.
#[derive(Debug, Clone)]
pub struct TextCall {
    pub prompt: String,
    pub text: String,
    pub purpose: String,
    pub response: String,
}

/// Returns scripted responses in order, then a deterministic echo of the
/// purpose and input.
#[derive(Default)]
pub struct MockTextModel {
    responses: Mutex<VecDeque<String>>,
    failures: Mutex<u32>,
    calls: Mutex<Vec<TextCall>>,
}

impl MockTextModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: &str) -> Self {
        guard(&self.responses).push_back(response.to_string());
        self
    }

    pub fn fail_next(&self, n: u32) {
        *guard(&self.failures) = n;
    }

    pub fn calls(&self) -> Vec<TextCall> {
        guard(&self.calls).clone()
    }

    pub fn calls_for(&self, purpose: &str) -> usize {
        guard(&self.calls).iter().filter(|c| c.purpose == purpose).count()
    }
}

#[async_trait]
impl TextModel for MockTextModel {
    async fn complete(&self, prompt: &str, text: &str, purpose: &str) -> ServiceResult<String> {
        if take_pending(&self.failures) {
            return Err(ServiceError::Transient(format!("injected {} failure", purpose)));
        }
        let response = guard(&self.responses).pop_front().unwrap_or_else(|| {
            let excerpt: String = text.chars().take(60).collect();
            format!("[{}] {}", purpose, excerpt.trim())
        });
        guard(&self.calls).push(TextCall {
            prompt: prompt.to_string(),
            text: text.to_string(),
            purpose: purpose.to_string(),
            response: response.clone(),
        });
        Ok(response)
    }
}

#[derive(Default)]
pub struct MockVisionModel {
    calls: Mutex<Vec<String>>,
}

impl MockVisionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        guard(&self.calls).clone()
    }
}

#[async_trait]
impl VisionModel for MockVisionModel {
    async fn describe_image(&self, image_url: &str) -> ServiceResult<String> {
        guard(&self.calls).push(image_url.to_string());
        Ok(format!("Ilustração em {}", image_url))
    }
}

#[derive(Default)]
pub struct MockImageGenerator {
    failures: Mutex<u32>,
    prompts: Mutex<Vec<String>>,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        *guard(&self.failures) = n;
    }

    pub fn prompts(&self) -> Vec<String> {
        guard(&self.prompts).clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate_image(&self, prompt: &str) -> ServiceResult<GeneratedImage> {
        if take_pending(&self.failures) {
            return Err(ServiceError::Transient("injected image failure".into()));
        }
        let mut prompts = guard(&self.prompts);
        prompts.push(prompt.to_string());
        Ok(GeneratedImage {
            source_url: format!("https://images.test/generated/{}.png", prompts.len()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        })
    }
}

#[derive(Default)]
pub struct MockObjectStorage {
    stored: Mutex<Vec<(Code, usize)>>,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner code and byte length of every stored object.
    pub fn stored(&self) -> Vec<(Code, usize)> {
        guard(&self.stored).clone()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn store_image(&self, owner: &Code, bytes: &[u8]) -> ServiceResult<String> {
        let mut stored = guard(&self.stored);
        stored.push((owner.clone(), bytes.len()));
        Ok(format!("https://cdn.test/{}/{}.png", owner, stored.len()))
    }
}

// =============================================================================
// Mock text extractor
// =============================================================================

/// Returns a canned text for any document unless told otherwise.
#[derive(Default)]
pub struct MockExtractor {
    documents: Mutex<HashMap<String, ExtractedText>>,
    unsupported: Mutex<HashSet<String>>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_document(&self, url: &str, text: &str, mime_type: &str) {
        guard(&self.documents).insert(
            url.to_string(),
            ExtractedText {
                text: text.to_string(),
                mime_type: mime_type.to_string(),
            },
        );
    }

    pub fn set_unsupported(&self, url: &str) {
        guard(&self.unsupported).insert(url.to_string());
    }

    pub fn fail_next(&self, url: &str, n: u32) {
        guard(&self.failures).insert(url.to_string(), n);
    }

    pub fn calls(&self, url: &str) -> usize {
        guard(&self.calls).iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl TextExtractor for MockExtractor {
    async fn extract_text(&self, document_url: &str) -> ServiceResult<ExtractedText> {
        guard(&self.calls).push(document_url.to_string());
        if take_failure(&self.failures, &document_url.to_string()) {
            return Err(ServiceError::Transient(format!("injected failure for {}", document_url)));
        }
        if guard(&self.unsupported).contains(document_url) {
            return Err(ServiceError::Unsupported(document_url.to_string()));
        }
        Ok(guard(&self.documents)
            .get(document_url)
            .cloned()
            .unwrap_or_else(|| ExtractedText {
                text: format!("Texto integral do documento {}", document_url),
                mime_type: "application/pdf".to_string(),
            }))
    }
}
