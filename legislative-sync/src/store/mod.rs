//! Persistence gateway.
//!
//! Entities with a plain natural key go through [`Registry`] and the
//! generic [`upsert`] helper. Articles and their
//! payload rows are registered as one unit through [`Store::register_article`].

pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use interfaces::defs::{
    Article, ArticleSummary, Classification, ClassificationKind, Deputy, EventSchedule,
    ExternalAuthor, ItemKind, LegislativeBody, Party, PropositionClassification,
    RegisteredArticle,
};
use interfaces::{Code, Entity, Id};
use thiserror::Error;
use tracing::debug;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the row; someone else registered it first.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("no default {0} classification configured")]
    MissingDefault(ClassificationKind),

    #[error("query failed: {0}")]
    Query(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A value together with the surrogate id of its row.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: Id,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNewsletter {
    pub id: Id,
    pub article_id: Id,
    pub title: String,
    pub description: String,
    pub articles: Vec<Id>,
}

/// Lookup and write access for one entity kind, keyed by natural key.
#[async_trait]
pub trait Registry<T: Entity>: Send + Sync {
    /// Returns `None` when no active row carries the key.
    async fn find(&self, key: &T::Key) -> StoreResult<Option<Stored<T>>>;

    async fn insert(&self, value: &T) -> StoreResult<Id>;

    async fn update(&self, id: Id, value: &T) -> StoreResult<()>;
}

#[async_trait]
pub trait Store:
    Registry<Party> + Registry<Deputy> + Registry<ExternalAuthor> + Registry<LegislativeBody> + Send + Sync
{
    /// The subset of `codes` already registered for `kind`.
    async fn registered_codes(&self, kind: ItemKind, codes: &[Code]) -> StoreResult<HashSet<Code>>;

    /// Classification row whose code list contains `code`, or the default
    /// row of the kind when nothing matches.
    async fn classification(
        &self,
        kind: ClassificationKind,
        code: Option<&str>,
    ) -> StoreResult<Classification>;

    async fn find_proposition(&self, code: &Code) -> StoreResult<Option<Stored<PropositionClassification>>>;

    async fn update_proposition_classification(
        &self,
        id: Id,
        classification: &PropositionClassification,
    ) -> StoreResult<()>;

    async fn find_event(&self, code: &Code) -> StoreResult<Option<Stored<EventSchedule>>>;

    async fn update_event_schedule(&self, id: Id, schedule: &EventSchedule) -> StoreResult<()>;

    /// Events starting on or after `since` that have not ended by `now`.
    async fn open_event_codes(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<Vec<Code>>;

    async fn find_voting(&self, code: &Code) -> StoreResult<Option<Id>>;

    /// Writes the article envelope, its payload and every relation row in
    /// one transaction.
    async fn register_article(&self, article: &Article) -> StoreResult<RegisteredArticle>;

    /// Non-newsletter articles with `from <= reference_at < to`, oldest first.
    async fn articles_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ArticleSummary>>;

    async fn find_newsletter(&self, date: NaiveDate) -> StoreResult<Option<StoredNewsletter>>;

    /// Links more articles to a newsletter and replaces its digest, in one
    /// transaction.
    async fn append_newsletter_articles(
        &self,
        newsletter_id: Id,
        article_ids: &[Id],
        title: &str,
        description: &str,
    ) -> StoreResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created(Id),
    Updated(Id),
    Unchanged(Id),
}

impl Upserted {
    pub fn id(&self) -> Id {
        match *self {
            Upserted::Created(id) | Upserted::Updated(id) | Upserted::Unchanged(id) => id,
        }
    }

    pub fn wrote(&self) -> bool {
        !matches!(self, Upserted::Unchanged(_))
    }
}

async fn reconcile<T, R>(registry: &R, stored: Stored<T>, value: &T) -> StoreResult<Upserted>
where
    T: Entity,
    R: Registry<T> + ?Sized,
{
    if stored.value == *value {
        return Ok(Upserted::Unchanged(stored.id));
    }
    registry.update(stored.id, value).await?;
    Ok(Upserted::Updated(stored.id))
}

/// Get-or-create with update-if-different. A unique violation on insert
/// means a concurrent path registered the row first, so it is re-read.
pub async fn upsert<T, R>(registry: &R, value: &T) -> StoreResult<Upserted>
where
    T: Entity,
    R: Registry<T> + ?Sized,
{
    let key = value.key();
    if let Some(stored) = registry.find(&key).await? {
        return reconcile(registry, stored, value).await;
    }
    match registry.insert(value).await {
        Ok(id) => Ok(Upserted::Created(id)),
        Err(StoreError::Conflict(what)) => {
            debug!("{} {} registered concurrently, re-reading", T::KIND, key);
            match registry.find(&key).await? {
                Some(stored) => reconcile(registry, stored, value).await,
                None => Err(StoreError::Conflict(what)),
            }
        }
        Err(e) => Err(e),
    }
}
