//! Get-or-create resolution of every entity an item references.
//!
//! Resolution is depth-first. Every id resolved during a run is memoized by
//! natural key, so a dependency reachable from several parents is fetched
//! once. Codes found to have no content are memoized too.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use interfaces::defs::{
    AgendaItemDraft, Article, AuthorRef, ClassificationKind, Deputy, EntityKind, EventDraft,
    EventSchedule, ExternalAuthor, ItemKind, LegislativeBody, Party, PropositionClassification,
    PropositionDraft, VotingDraft,
};
use interfaces::services::LegislativeSource;
use interfaces::state::{EnrichmentProgress, EnrichmentStage};
use interfaces::upstream::UpstreamAuthor;
use interfaces::{Code, Entity, Id, ServiceError};
use tracing::{debug, info, warn};

use crate::processing::Enricher;
use crate::store::{upsert, Registry, Store, StoreError, Stored, Upserted};
use crate::types::{Result, SyncError};
use crate::utils::normalize_party_acronym;

type MemoKey = (EntityKind, String);

pub struct DependencyResolver {
    source: Arc<dyn LegislativeSource>,
    store: Arc<dyn Store>,
    enricher: Enricher,
    /// `None` marks a code with no retrievable content.
    memo: Mutex<HashMap<MemoKey, Option<Id>>>,
}

/// Keeps an optional relation out of the parent when the referenced item
/// has no content or no longer exists upstream.
fn relation(kind: EntityKind, code: &Code, result: Result<Id>) -> Result<Option<Id>> {
    match result {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.is_no_content() => {
            info!(kind = %kind, code = %code, "Dropping relation to {} {}: no content", kind, code);
            Ok(None)
        }
        Err(SyncError::NotFound(reason)) => {
            warn!(kind = %kind, code = %code, "Dropping relation to {} {}: {}", kind, code, reason);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn push_unique(ids: &mut Vec<Id>, id: Id) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

impl DependencyResolver {
    pub fn new(source: Arc<dyn LegislativeSource>, store: Arc<dyn Store>, enricher: Enricher) -> Self {
        Self {
            source,
            store,
            enricher,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Forget everything resolved so far; called at the start of each run.
    pub fn reset_memo(&self) {
        self.memo().clear();
    }

    fn memo(&self) -> MutexGuard<'_, HashMap<MemoKey, Option<Id>>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remembered(&self, kind: EntityKind, key: &str) -> Option<Option<Id>> {
        self.memo().get(&(kind, key.to_string())).copied()
    }

    fn remember(&self, kind: EntityKind, key: &str, id: Option<Id>) {
        self.memo().insert((kind, key.to_string()), id);
    }

    /// Top-level entry point for a discovered item.
    pub async fn resolve(&self, kind: ItemKind, code: &Code) -> Result<Upserted> {
        match kind {
            ItemKind::Proposition => self.resolve_proposition(code).await,
            ItemKind::Voting => self.resolve_voting(code).await,
            ItemKind::Event => self.resolve_event(code).await,
        }
    }

    async fn persist<T>(&self, value: &T) -> Result<Id>
    where
        T: Entity,
        dyn Store: Registry<T>,
    {
        let outcome = upsert(self.store.as_ref(), value).await?;
        match outcome {
            Upserted::Created(id) => {
                info!(kind = %T::KIND, key = %value.key(), id, "Registered {} {}", T::KIND, value.key())
            }
            Upserted::Updated(id) => {
                info!(kind = %T::KIND, key = %value.key(), id, "Updated drifted {} {}", T::KIND, value.key())
            }
            Upserted::Unchanged(id) => {
                debug!(kind = %T::KIND, key = %value.key(), id, "{} {} unchanged", T::KIND, value.key())
            }
        }
        Ok(outcome.id())
    }

    pub async fn resolve_party(&self, acronym: &str) -> Result<Id> {
        let acronym = normalize_party_acronym(acronym);
        if let Some(Some(id)) = self.remembered(EntityKind::Party, &acronym) {
            return Ok(id);
        }
        let upstream = self.source.party(&acronym).await?;
        let party = Party::new(upstream.code, upstream.name, acronym.clone(), upstream.image_url)?;
        let id = self.persist(&party).await?;
        self.remember(EntityKind::Party, &acronym, Some(id));
        Ok(id)
    }

    pub async fn resolve_deputy(&self, code: &Code) -> Result<Id> {
        if let Some(Some(id)) = self.remembered(EntityKind::Deputy, code.as_str()) {
            return Ok(id);
        }
        let upstream = self.source.deputy(code).await?;
        let party_id = if upstream.party_acronym.trim().is_empty() {
            None
        } else {
            Some(self.resolve_party(&upstream.party_acronym).await?)
        };
        let deputy = Deputy::new(
            upstream.code,
            upstream.name,
            upstream.electoral_name,
            upstream.image_url,
            party_id,
            upstream.federated_unit,
        )?;
        let id = self.persist(&deputy).await?;
        self.remember(EntityKind::Deputy, code.as_str(), Some(id));
        Ok(id)
    }

    pub async fn resolve_external_author(&self, name: &str, type_code: &str) -> Result<Id> {
        let name = name.trim();
        if let Some(Some(id)) = self.remembered(EntityKind::ExternalAuthor, name) {
            return Ok(id);
        }
        let author_type = self
            .store
            .classification(ClassificationKind::ExternalAuthorType, Some(type_code))
            .await?;
        let author = ExternalAuthor::new(name, author_type.id)?;
        let id = self.persist(&author).await?;
        self.remember(EntityKind::ExternalAuthor, name, Some(id));
        Ok(id)
    }

    pub async fn resolve_legislative_body(&self, code: &Code) -> Result<Id> {
        if let Some(Some(id)) = self.remembered(EntityKind::LegislativeBody, code.as_str()) {
            return Ok(id);
        }
        let upstream = self.source.legislative_body(code).await?;
        let body = LegislativeBody::new(upstream.code, upstream.name, upstream.acronym)?;
        let id = self.persist(&body).await?;
        self.remember(EntityKind::LegislativeBody, code.as_str(), Some(id));
        Ok(id)
    }

    async fn resolve_authors(&self, authors: &[UpstreamAuthor]) -> Result<Vec<AuthorRef>> {
        let mut refs = Vec::with_capacity(authors.len());
        for author in authors {
            let author = match author {
                UpstreamAuthor::Deputy { code } => AuthorRef::Deputy(self.resolve_deputy(code).await?),
                UpstreamAuthor::External { name, type_code } => {
                    AuthorRef::External(self.resolve_external_author(name, type_code).await?)
                }
            };
            if !refs.contains(&author) {
                refs.push(author);
            }
        }
        Ok(refs)
    }

    async fn find_registered(&self, kind: ItemKind, code: &Code) -> Result<Option<Id>> {
        Ok(match kind {
            ItemKind::Proposition => self.store.find_proposition(code).await?.map(|s| s.id),
            ItemKind::Voting => self.store.find_voting(code).await?,
            ItemKind::Event => self.store.find_event(code).await?.map(|s| s.id),
        })
    }

    /// Registers the article in one transaction. Losing a race to another
    /// path is not an error: the winner's row is returned.
    async fn register_article(&self, kind: ItemKind, code: &Code, article: &Article) -> Result<Upserted> {
        match self.store.register_article(article).await {
            Ok(registered) => {
                info!(
                    kind = %kind,
                    code = %code,
                    id = registered.entity_id,
                    article_id = registered.article_id,
                    "Registered {} {}",
                    kind,
                    code
                );
                Ok(Upserted::Created(registered.entity_id))
            }
            Err(StoreError::Conflict(what)) => {
                debug!("{} {} registered concurrently, re-reading", kind, code);
                self.find_registered(kind, code)
                    .await?
                    .map(Upserted::Unchanged)
                    .ok_or(SyncError::PersistenceConflict(what))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn proposition_relations(&self, codes: &[Code]) -> Result<Vec<Id>> {
        let mut ids = Vec::with_capacity(codes.len());
        for code in codes {
            let resolved = self.resolve_proposition(code).await.map(|u| u.id());
            if let Some(id) = relation(EntityKind::Proposition, code, resolved)? {
                push_unique(&mut ids, id);
            }
        }
        Ok(ids)
    }

    // ---------------------------------------------------------------------
    // Propositions
    // ---------------------------------------------------------------------

    pub async fn resolve_proposition(&self, code: &Code) -> Result<Upserted> {
        match self.remembered(EntityKind::Proposition, code.as_str()) {
            Some(Some(id)) => return Ok(Upserted::Unchanged(id)),
            Some(None) => return Err(SyncError::no_content(EntityKind::Proposition, code)),
            None => {}
        }

        let result = match self.store.find_proposition(code).await? {
            Some(stored) => self.refresh_proposition(code, stored).await,
            None => self.register_proposition(code).await,
        };
        match &result {
            Ok(outcome) => self.remember(EntityKind::Proposition, code.as_str(), Some(outcome.id())),
            Err(e) if e.is_no_content() => self.remember(EntityKind::Proposition, code.as_str(), None),
            Err(_) => {}
        }
        result
    }

    async fn refresh_proposition(
        &self,
        code: &Code,
        stored: Stored<PropositionClassification>,
    ) -> Result<Upserted> {
        let upstream = match self.source.proposition(code).await {
            Ok(upstream) => upstream,
            Err(ServiceError::NotFound(reason)) => {
                warn!(kind = "proposition", code = %code, id = stored.id, "Keeping stored proposition: {}", reason);
                return Ok(Upserted::Unchanged(stored.id));
            }
            Err(e) => return Err(e.into()),
        };
        let proposition_type = self
            .store
            .classification(ClassificationKind::PropositionType, Some(&upstream.type_code))
            .await?;
        let current = PropositionClassification {
            type_id: proposition_type.id,
            specific_type: upstream.specific_type,
        };
        if current == stored.value {
            return Ok(Upserted::Unchanged(stored.id));
        }
        self.store
            .update_proposition_classification(stored.id, &current)
            .await?;
        info!(kind = "proposition", code = %code, id = stored.id, "Updated drifted proposition classification");
        Ok(Upserted::Updated(stored.id))
    }

    async fn register_proposition(&self, code: &Code) -> Result<Upserted> {
        let mut progress = EnrichmentProgress::new();
        let upstream = self.source.proposition(code).await?;
        let proposition_type = self
            .store
            .classification(ClassificationKind::PropositionType, Some(&upstream.type_code))
            .await?;

        let content = self
            .enricher
            .enrich_proposition(&upstream, proposition_type, &mut progress)
            .await?;
        let authors = self.resolve_authors(&upstream.authors).await?;

        let proposition = PropositionDraft {
            code: Some(upstream.code),
            original_text_url: content.original_text_url,
            original_text_mime_type: content.original_text_mime_type,
            title: content.title,
            summary: content.summary,
            submitted_at: Some(upstream.submitted_at),
            illustration: content.illustration,
            specific_type: upstream.specific_type,
            type_id: Some(proposition_type.id),
            authors,
        }
        .build()?;

        let outcome = self
            .register_article(ItemKind::Proposition, code, &Article::proposition(proposition))
            .await?;
        progress.advance(EnrichmentStage::Persisted)?;
        Ok(outcome)
    }

    // ---------------------------------------------------------------------
    // Votings
    // ---------------------------------------------------------------------

    pub async fn resolve_voting(&self, code: &Code) -> Result<Upserted> {
        if let Some(Some(id)) = self.remembered(EntityKind::Voting, code.as_str()) {
            return Ok(Upserted::Unchanged(id));
        }
        let outcome = match self.store.find_voting(code).await? {
            Some(id) => Upserted::Unchanged(id),
            None => self.register_voting(code).await?,
        };
        self.remember(EntityKind::Voting, code.as_str(), Some(outcome.id()));
        Ok(outcome)
    }

    async fn register_voting(&self, code: &Code) -> Result<Upserted> {
        let upstream = self.source.voting(code).await?;

        let legislative_body_id = match &upstream.legislative_body {
            Some(body) => Some(self.resolve_legislative_body(body).await?),
            None => None,
        };
        let main_proposition_id = match &upstream.main_proposition {
            Some(main) => {
                let resolved = self.resolve_proposition(main).await.map(|u| u.id());
                relation(EntityKind::Proposition, main, resolved)?
            }
            None => None,
        };
        let related_propositions = self.proposition_relations(&upstream.related_propositions).await?;
        let affected_propositions = self.proposition_relations(&upstream.affected_propositions).await?;

        let voting = VotingDraft {
            code: Some(upstream.code),
            result_description: upstream.description,
            result_at: Some(upstream.result_at),
            approved: upstream.approved.unwrap_or(false),
            legislative_body_id,
            main_proposition_id,
            related_propositions,
            affected_propositions,
        }
        .build()?;

        self.register_article(ItemKind::Voting, code, &Article::voting(voting)).await
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub async fn resolve_event(&self, code: &Code) -> Result<Upserted> {
        if let Some(Some(id)) = self.remembered(EntityKind::Event, code.as_str()) {
            return Ok(Upserted::Unchanged(id));
        }
        let outcome = match self.store.find_event(code).await? {
            Some(stored) => self.refresh_event(code, stored).await?,
            None => self.register_event(code).await?,
        };
        self.remember(EntityKind::Event, code.as_str(), Some(outcome.id()));
        Ok(outcome)
    }

    /// Re-fetches a registered event and updates its situation and time
    /// window when they drifted.
    async fn refresh_event(&self, code: &Code, stored: Stored<EventSchedule>) -> Result<Upserted> {
        let upstream = match self.source.event(code).await {
            Ok(upstream) => upstream,
            Err(ServiceError::NotFound(reason)) => {
                warn!(kind = "event", code = %code, id = stored.id, "Keeping stored event: {}", reason);
                return Ok(Upserted::Unchanged(stored.id));
            }
            Err(e) => return Err(e.into()),
        };
        let situation = self
            .store
            .classification(ClassificationKind::EventSituation, upstream.situation.as_deref())
            .await?;
        let current = EventSchedule {
            situation_id: situation.id,
            starts_at: upstream.starts_at,
            ends_at: upstream.ends_at,
        };
        if current == stored.value {
            return Ok(Upserted::Unchanged(stored.id));
        }
        if current.ends_at.is_some_and(|end| end < current.starts_at) {
            warn!(kind = "event", code = %code, id = stored.id, "Ignoring inverted time window from upstream");
            return Ok(Upserted::Unchanged(stored.id));
        }
        self.store.update_event_schedule(stored.id, &current).await?;
        info!(kind = "event", code = %code, id = stored.id, "Updated drifted event schedule");
        Ok(Upserted::Updated(stored.id))
    }

    async fn register_event(&self, code: &Code) -> Result<Upserted> {
        let mut progress = EnrichmentProgress::new();
        let upstream = self.source.event(code).await?;

        let mut legislative_bodies = Vec::with_capacity(upstream.legislative_bodies.len());
        for body in &upstream.legislative_bodies {
            push_unique(&mut legislative_bodies, self.resolve_legislative_body(body).await?);
        }
        let requirements = self.proposition_relations(&upstream.requirements).await?;

        let mut agenda = Vec::with_capacity(upstream.agenda.len());
        for item in &upstream.agenda {
            let regime = self
                .store
                .classification(ClassificationKind::AgendaRegime, item.regime_code.as_deref())
                .await?;
            let rapporteur_id = match &item.rapporteur {
                Some(deputy) => relation(EntityKind::Deputy, deputy, self.resolve_deputy(deputy).await)?,
                None => None,
            };
            let proposition_id = match &item.proposition {
                Some(p) => relation(EntityKind::Proposition, p, self.resolve_proposition(p).await.map(|u| u.id()))?,
                None => None,
            };
            let related_proposition_id = match &item.related_proposition {
                Some(p) => relation(EntityKind::Proposition, p, self.resolve_proposition(p).await.map(|u| u.id()))?,
                None => None,
            };
            let voting_id = match &item.voting {
                Some(v) => relation(EntityKind::Voting, v, self.resolve_voting(v).await.map(|u| u.id()))?,
                None => None,
            };
            agenda.push(AgendaItemDraft {
                title: item.title.clone(),
                topic: item.topic.clone(),
                regime_id: Some(regime.id),
                rapporteur_id,
                proposition_id,
                related_proposition_id,
                voting_id,
                situation: item.situation.clone(),
            });
        }

        let event_type = self
            .store
            .classification(ClassificationKind::EventType, upstream.type_code.as_deref())
            .await?;
        let situation = self
            .store
            .classification(ClassificationKind::EventSituation, upstream.situation.as_deref())
            .await?;

        let content = self.enricher.enrich_event(&upstream, &mut progress).await?;

        let event = EventDraft {
            code: Some(upstream.code),
            title: content.title,
            description: content.description,
            starts_at: Some(upstream.starts_at),
            ends_at: upstream.ends_at,
            location: upstream.location,
            is_internal: upstream.is_internal,
            video_url: upstream.video_url,
            type_id: Some(event_type.id),
            situation_id: Some(situation.id),
            legislative_bodies,
            requirements,
            agenda,
        }
        .build()?;

        let outcome = self
            .register_article(ItemKind::Event, code, &Article::event(event))
            .await?;
        progress.advance(EnrichmentStage::Persisted)?;
        Ok(outcome)
    }
}
