//! In-memory persistence gateway for tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use interfaces::defs::{
    Article, ArticleKind, ArticlePayload, ArticleSummary, Classification, ClassificationKind,
    Deputy, EntityKind, Event, EventSchedule, ExternalAuthor, ItemKind, LegislativeBody, Newsletter,
    Party, Proposition, PropositionClassification, RegisteredArticle, Voting,
};
use interfaces::{Code, Entity, Id};

use super::{Registry, Store, StoreError, StoreResult, Stored, StoredNewsletter};

struct ClassificationRow {
    id: Id,
    kind: ClassificationKind,
    codes: Vec<String>,
    is_default: bool,
}

struct ArticleRow {
    article_id: Id,
    entity_id: Id,
    article: Article,
}

#[derive(Default)]
struct Tables {
    next_id: Id,
    classifications: Vec<ClassificationRow>,
    parties: Vec<Stored<Party>>,
    deputies: Vec<Stored<Deputy>>,
    external_authors: Vec<Stored<ExternalAuthor>>,
    legislative_bodies: Vec<Stored<LegislativeBody>>,
    articles: Vec<ArticleRow>,
    writes: HashMap<EntityKind, usize>,
    hidden_lookups: HashSet<EntityKind>,
    failing_registrations: usize,
    unavailable: bool,
}

impl Tables {
    fn allocate(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn wrote(&mut self, kind: EntityKind) {
        *self.writes.entry(kind).or_default() += 1;
    }

    /// Consumes a pending "pretend this row is not there yet" flag.
    fn take_hidden(&mut self, kind: EntityKind) -> bool {
        self.hidden_lookups.remove(&kind)
    }

    fn is_default_classification(&self, id: Id) -> bool {
        self.classifications
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.is_default)
            .unwrap_or(true)
    }

    fn payload_with_code(&self, kind: ArticleKind, code: &Code) -> Option<&ArticleRow> {
        self.articles
            .iter()
            .find(|row| row.article.kind() == kind && row.article.code() == Some(code))
    }

    fn payload_mut(&mut self, kind: ArticleKind, entity_id: Id) -> Option<&mut ArticlePayload> {
        self.articles
            .iter_mut()
            .find(|row| row.article.kind() == kind && row.entity_id == entity_id)
            .map(|row| &mut row.article.payload)
    }

    fn summary(&self, row: &ArticleRow) -> Option<ArticleSummary> {
        let (title, content, has_specific_type) = match &row.article.payload {
            ArticlePayload::Proposition(p) => (
                p.title.clone(),
                p.summary.clone(),
                !self.is_default_classification(p.type_id),
            ),
            ArticlePayload::Event(e) => (
                e.title.clone(),
                e.description.clone(),
                !self.is_default_classification(e.type_id),
            ),
            ArticlePayload::Voting(v) => (
                format!("Votação {}", v.code),
                v.result_description.clone(),
                false,
            ),
            ArticlePayload::Newsletter(_) => return None,
        };
        Some(ArticleSummary {
            article_id: row.article_id,
            kind: row.article.kind(),
            title,
            content,
            reference_at: row.article.reference_at,
            has_specific_type,
        })
    }
}

/// Keeps every table in process memory while honouring the same uniqueness
/// rules as the relational schema. Counts writes per entity kind.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store seeded with one default classification per kind.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for kind in ClassificationKind::ALL {
            let id = tables.allocate();
            tables.classifications.push(ClassificationRow {
                id,
                kind,
                codes: Vec::new(),
                is_default: true,
            });
        }
        Self {
            tables: Mutex::new(tables),
        }
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        if tables.unavailable {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(tables)
    }

    fn inspect<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        match self.tables.lock() {
            Ok(tables) => f(&tables),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn configure(&self, f: impl FnOnce(&mut Tables)) {
        match self.tables.lock() {
            Ok(mut tables) => f(&mut tables),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Add a curated classification matching `codes`.
    pub fn add_classification(&self, kind: ClassificationKind, codes: &[&str]) -> Id {
        let mut id = 0;
        self.configure(|t| {
            id = t.allocate();
            t.classifications.push(ClassificationRow {
                id,
                kind,
                codes: codes.iter().map(|c| c.trim().to_string()).collect(),
                is_default: false,
            });
        });
        id
    }

    pub fn default_classification(&self, kind: ClassificationKind) -> Option<Id> {
        self.inspect(|t| {
            t.classifications
                .iter()
                .find(|c| c.kind == kind && c.is_default)
                .map(|c| c.id)
        })
    }

    /// Make the next lookup of `kind` miss, as if a concurrent path had not
    /// committed yet.
    pub fn hide_next_lookup(&self, kind: EntityKind) {
        self.configure(|t| {
            t.hidden_lookups.insert(kind);
        });
    }

    /// Make the next `n` article registrations fail before writing anything.
    pub fn fail_next_registrations(&self, n: usize) {
        self.configure(|t| t.failing_registrations = n);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.configure(|t| t.unavailable = unavailable);
    }

    pub fn writes(&self, kind: EntityKind) -> usize {
        self.inspect(|t| t.writes.get(&kind).copied().unwrap_or(0))
    }

    pub fn total_writes(&self) -> usize {
        self.inspect(|t| t.writes.values().sum())
    }

    pub fn article_count(&self) -> usize {
        self.inspect(|t| t.articles.len())
    }

    pub fn parties(&self) -> Vec<Stored<Party>> {
        self.inspect(|t| t.parties.clone())
    }

    pub fn deputies(&self) -> Vec<Stored<Deputy>> {
        self.inspect(|t| t.deputies.clone())
    }

    pub fn external_authors(&self) -> Vec<Stored<ExternalAuthor>> {
        self.inspect(|t| t.external_authors.clone())
    }

    pub fn legislative_bodies(&self) -> Vec<Stored<LegislativeBody>> {
        self.inspect(|t| t.legislative_bodies.clone())
    }

    pub fn propositions(&self) -> Vec<Stored<Proposition>> {
        self.inspect(|t| {
            t.articles
                .iter()
                .filter_map(|row| match &row.article.payload {
                    ArticlePayload::Proposition(p) => Some(Stored {
                        id: row.entity_id,
                        value: p.clone(),
                    }),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn events(&self) -> Vec<Stored<Event>> {
        self.inspect(|t| {
            t.articles
                .iter()
                .filter_map(|row| match &row.article.payload {
                    ArticlePayload::Event(e) => Some(Stored {
                        id: row.entity_id,
                        value: e.clone(),
                    }),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn votings(&self) -> Vec<Stored<Voting>> {
        self.inspect(|t| {
            t.articles
                .iter()
                .filter_map(|row| match &row.article.payload {
                    ArticlePayload::Voting(v) => Some(Stored {
                        id: row.entity_id,
                        value: v.clone(),
                    }),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn newsletters(&self) -> Vec<Stored<Newsletter>> {
        self.inspect(|t| {
            t.articles
                .iter()
                .filter_map(|row| match &row.article.payload {
                    ArticlePayload::Newsletter(n) => Some(Stored {
                        id: row.entity_id,
                        value: n.clone(),
                    }),
                    _ => None,
                })
                .collect()
        })
    }
}

macro_rules! memory_registry {
    ($entity:ty, $table:ident) => {
        #[async_trait]
        impl Registry<$entity> for MemoryStore {
            async fn find(
                &self,
                key: &<$entity as Entity>::Key,
            ) -> StoreResult<Option<Stored<$entity>>> {
                let mut t = self.tables()?;
                if t.take_hidden(<$entity as Entity>::KIND) {
                    return Ok(None);
                }
                Ok(t.$table.iter().find(|row| row.value.key() == *key).cloned())
            }

            async fn insert(&self, value: &$entity) -> StoreResult<Id> {
                let mut t = self.tables()?;
                let key = value.key();
                if t.$table.iter().any(|row| row.value.key() == key) {
                    return Err(StoreError::Conflict(format!(
                        "{} {}",
                        <$entity as Entity>::KIND,
                        key
                    )));
                }
                let id = t.allocate();
                t.$table.push(Stored {
                    id,
                    value: value.clone(),
                });
                t.wrote(<$entity as Entity>::KIND);
                Ok(id)
            }

            async fn update(&self, id: Id, value: &$entity) -> StoreResult<()> {
                let mut t = self.tables()?;
                let row = t
                    .$table
                    .iter_mut()
                    .find(|row| row.id == id)
                    .ok_or_else(|| StoreError::Query(format!("no row {}", id)))?;
                row.value = value.clone();
                t.wrote(<$entity as Entity>::KIND);
                Ok(())
            }
        }
    };
}

memory_registry!(Party, parties);
memory_registry!(Deputy, deputies);
memory_registry!(ExternalAuthor, external_authors);
memory_registry!(LegislativeBody, legislative_bodies);

fn article_kind(kind: ItemKind) -> ArticleKind {
    match kind {
        ItemKind::Proposition => ArticleKind::Proposition,
        ItemKind::Voting => ArticleKind::Voting,
        ItemKind::Event => ArticleKind::Event,
    }
}

fn entity_kind(kind: ArticleKind) -> EntityKind {
    match kind {
        ArticleKind::Proposition => EntityKind::Proposition,
        ArticleKind::Voting => EntityKind::Voting,
        ArticleKind::Event => EntityKind::Event,
        ArticleKind::Newsletter => EntityKind::Newsletter,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn registered_codes(&self, kind: ItemKind, codes: &[Code]) -> StoreResult<HashSet<Code>> {
        let t = self.tables()?;
        let kind = article_kind(kind);
        Ok(codes
            .iter()
            .filter(|code| t.payload_with_code(kind, code).is_some())
            .cloned()
            .collect())
    }

    async fn classification(
        &self,
        kind: ClassificationKind,
        code: Option<&str>,
    ) -> StoreResult<Classification> {
        let t = self.tables()?;
        let code = code.map(str::trim).filter(|c| !c.is_empty());
        let matched = code.and_then(|code| {
            t.classifications
                .iter()
                .find(|c| c.kind == kind && !c.is_default && c.codes.iter().any(|x| x == code))
        });
        matched
            .or_else(|| t.classifications.iter().find(|c| c.kind == kind && c.is_default))
            .map(|c| Classification {
                id: c.id,
                is_default: c.is_default,
            })
            .ok_or(StoreError::MissingDefault(kind))
    }

    async fn find_proposition(&self, code: &Code) -> StoreResult<Option<Stored<PropositionClassification>>> {
        let mut t = self.tables()?;
        if t.take_hidden(EntityKind::Proposition) {
            return Ok(None);
        }
        Ok(t.payload_with_code(ArticleKind::Proposition, code)
            .and_then(|row| match &row.article.payload {
                ArticlePayload::Proposition(p) => Some(Stored {
                    id: row.entity_id,
                    value: PropositionClassification {
                        type_id: p.type_id,
                        specific_type: p.specific_type.clone(),
                    },
                }),
                _ => None,
            }))
    }

    async fn update_proposition_classification(
        &self,
        id: Id,
        classification: &PropositionClassification,
    ) -> StoreResult<()> {
        let mut t = self.tables()?;
        match t.payload_mut(ArticleKind::Proposition, id) {
            Some(ArticlePayload::Proposition(p)) => {
                p.type_id = classification.type_id;
                p.specific_type = classification.specific_type.clone();
            }
            _ => return Err(StoreError::Query(format!("no proposition {}", id))),
        }
        t.wrote(EntityKind::Proposition);
        Ok(())
    }

    async fn find_event(&self, code: &Code) -> StoreResult<Option<Stored<EventSchedule>>> {
        let mut t = self.tables()?;
        if t.take_hidden(EntityKind::Event) {
            return Ok(None);
        }
        Ok(t.payload_with_code(ArticleKind::Event, code)
            .and_then(|row| match &row.article.payload {
                ArticlePayload::Event(e) => Some(Stored {
                    id: row.entity_id,
                    value: e.schedule(),
                }),
                _ => None,
            }))
    }

    async fn update_event_schedule(&self, id: Id, schedule: &EventSchedule) -> StoreResult<()> {
        let mut t = self.tables()?;
        match t.payload_mut(ArticleKind::Event, id) {
            Some(ArticlePayload::Event(e)) => {
                e.situation_id = schedule.situation_id;
                e.starts_at = schedule.starts_at;
                e.ends_at = schedule.ends_at;
            }
            _ => return Err(StoreError::Query(format!("no event {}", id))),
        }
        t.wrote(EntityKind::Event);
        Ok(())
    }

    async fn open_event_codes(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<Vec<Code>> {
        let t = self.tables()?;
        let mut open: Vec<(DateTime<Utc>, Id, Code)> = t
            .articles
            .iter()
            .filter_map(|row| match &row.article.payload {
                ArticlePayload::Event(e)
                    if e.starts_at >= since && e.ends_at.map_or(true, |end| end > now) =>
                {
                    Some((e.starts_at, row.entity_id, e.code.clone()))
                }
                _ => None,
            })
            .collect();
        open.sort();
        Ok(open.into_iter().map(|(_, _, code)| code).collect())
    }

    async fn find_voting(&self, code: &Code) -> StoreResult<Option<Id>> {
        let t = self.tables()?;
        Ok(t.payload_with_code(ArticleKind::Voting, code).map(|row| row.entity_id))
    }

    async fn register_article(&self, article: &Article) -> StoreResult<RegisteredArticle> {
        let mut t = self.tables()?;
        if t.failing_registrations > 0 {
            t.failing_registrations -= 1;
            return Err(StoreError::Query("injected registration failure".into()));
        }

        let kind = article.kind();
        let duplicate = match &article.payload {
            ArticlePayload::Newsletter(n) => t.articles.iter().any(|row| {
                matches!(&row.article.payload, ArticlePayload::Newsletter(other) if other.reference_date == n.reference_date)
            }),
            _ => article
                .code()
                .map_or(false, |code| t.payload_with_code(kind, code).is_some()),
        };
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} {}",
                kind,
                article.code().map(Code::to_string).unwrap_or_default()
            )));
        }

        let article_id = t.allocate();
        let entity_id = t.allocate();
        t.articles.push(ArticleRow {
            article_id,
            entity_id,
            article: article.clone(),
        });
        t.wrote(entity_kind(kind));
        Ok(RegisteredArticle {
            article_id,
            entity_id,
        })
    }

    async fn articles_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ArticleSummary>> {
        let t = self.tables()?;
        let mut summaries: Vec<ArticleSummary> = t
            .articles
            .iter()
            .filter(|row| row.article.reference_at >= from && row.article.reference_at < to)
            .filter_map(|row| t.summary(row))
            .collect();
        summaries.sort_by(|a, b| {
            a.reference_at
                .cmp(&b.reference_at)
                .then(a.article_id.cmp(&b.article_id))
        });
        Ok(summaries)
    }

    async fn find_newsletter(&self, date: NaiveDate) -> StoreResult<Option<StoredNewsletter>> {
        let t = self.tables()?;
        Ok(t.articles.iter().find_map(|row| match &row.article.payload {
            ArticlePayload::Newsletter(n) if n.reference_date == date => {
                let mut articles = n.articles.clone();
                articles.sort_unstable();
                Some(StoredNewsletter {
                    id: row.entity_id,
                    article_id: row.article_id,
                    title: n.title.clone(),
                    description: n.description.clone(),
                    articles,
                })
            }
            _ => None,
        }))
    }

    async fn append_newsletter_articles(
        &self,
        newsletter_id: Id,
        article_ids: &[Id],
        title: &str,
        description: &str,
    ) -> StoreResult<()> {
        let mut t = self.tables()?;
        match t.payload_mut(ArticleKind::Newsletter, newsletter_id) {
            Some(ArticlePayload::Newsletter(n)) => {
                for id in article_ids {
                    if !n.articles.contains(id) {
                        n.articles.push(*id);
                    }
                }
                n.title = title.to_string();
                n.description = description.to_string();
            }
            _ => return Err(StoreError::Query(format!("no newsletter {}", newsletter_id))),
        }
        t.wrote(EntityKind::Newsletter);
        Ok(())
    }
}
