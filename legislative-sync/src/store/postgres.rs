use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use interfaces::defs::{
    Article, ArticleKind, ArticlePayload, ArticleSummary, AuthorRef, Classification,
    ClassificationKind, Deputy, Event, EventSchedule, ExternalAuthor, ItemKind, LegislativeBody,
    Newsletter, Party, Proposition, PropositionClassification, RegisteredArticle, Voting,
};
use interfaces::{Code, Id};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

use super::{Registry, Store, StoreError, StoreResult, Stored, StoredNewsletter};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.constraint().unwrap_or("unique index").to_string())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Query(e.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Query(format!("migration failed: {}", e))
    }
}

fn table_for(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Proposition => "propositions",
        ItemKind::Voting => "votings",
        ItemKind::Event => "events",
    }
}

fn code_of(row: &PgRow) -> StoreResult<Code> {
    Ok(Code::new(row.try_get::<String, _>("code")?))
}

/// PostgreSQL-backed persistence gateway.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn insert_article_row(
        tx: &mut Transaction<'_, Postgres>,
        article: &Article,
    ) -> StoreResult<Id> {
        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO articles (kind, reference_at, views, rating)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(article.kind().as_str())
        .bind(article.reference_at)
        .bind(article.views)
        .bind(article.rating)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn insert_proposition(
        tx: &mut Transaction<'_, Postgres>,
        article_id: Id,
        p: &Proposition,
    ) -> StoreResult<Id> {
        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO propositions
                (article_id, code, original_text_url, original_text_mime_type, title, summary,
                 submitted_at, image_url, image_description, specific_type, type_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(article_id)
        .bind(p.code.as_str())
        .bind(&p.original_text_url)
        .bind(&p.original_text_mime_type)
        .bind(&p.title)
        .bind(&p.summary)
        .bind(p.submitted_at)
        .bind(p.illustration.as_ref().map(|i| i.image_url.as_str()))
        .bind(p.illustration.as_ref().map(|i| i.description.as_str()))
        .bind(&p.specific_type)
        .bind(p.type_id)
        .fetch_one(&mut **tx)
        .await?;

        for author in &p.authors {
            let (deputy_id, external_id) = match *author {
                AuthorRef::Deputy(id) => (Some(id), None),
                AuthorRef::External(id) => (None, Some(id)),
            };
            sqlx::query(
                "INSERT INTO proposition_authors (proposition_id, deputy_id, external_author_id) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(deputy_id)
            .bind(external_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(id)
    }

    async fn insert_voting(
        tx: &mut Transaction<'_, Postgres>,
        article_id: Id,
        v: &Voting,
    ) -> StoreResult<Id> {
        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO votings
                (article_id, code, result_description, result_at, approved, legislative_body_id, main_proposition_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(article_id)
        .bind(v.code.as_str())
        .bind(&v.result_description)
        .bind(v.result_at)
        .bind(v.approved)
        .bind(v.legislative_body_id)
        .bind(v.main_proposition_id)
        .fetch_one(&mut **tx)
        .await?;

        let relations = v
            .related_propositions
            .iter()
            .map(|p| (*p, "related"))
            .chain(v.affected_propositions.iter().map(|p| (*p, "affected")));
        for (proposition_id, relation) in relations {
            sqlx::query(
                r#"
                INSERT INTO voting_propositions (voting_id, proposition_id, relation)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(proposition_id)
            .bind(relation)
            .execute(&mut **tx)
            .await?;
        }
        Ok(id)
    }

    async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        article_id: Id,
        e: &Event,
    ) -> StoreResult<Id> {
        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO events
                (article_id, code, title, description, starts_at, ends_at, location, is_internal,
                 video_url, type_id, situation_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(article_id)
        .bind(e.code.as_str())
        .bind(&e.title)
        .bind(&e.description)
        .bind(e.starts_at)
        .bind(e.ends_at)
        .bind(&e.location)
        .bind(e.is_internal)
        .bind(e.video_url.as_deref())
        .bind(e.type_id)
        .bind(e.situation_id)
        .fetch_one(&mut **tx)
        .await?;

        for body_id in &e.legislative_bodies {
            sqlx::query(
                "INSERT INTO event_legislative_bodies (event_id, legislative_body_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(body_id)
            .execute(&mut **tx)
            .await?;
        }

        for proposition_id in &e.requirements {
            sqlx::query(
                "INSERT INTO event_requirements (event_id, proposition_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(proposition_id)
            .execute(&mut **tx)
            .await?;
        }

        for (position, item) in e.agenda.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO event_agenda_items
                    (event_id, position, title, topic, regime_id, rapporteur_id, proposition_id,
                     related_proposition_id, voting_id, situation)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(id)
            .bind(position as i32)
            .bind(&item.title)
            .bind(&item.topic)
            .bind(item.regime_id)
            .bind(item.rapporteur_id)
            .bind(item.proposition_id)
            .bind(item.related_proposition_id)
            .bind(item.voting_id)
            .bind(item.situation.as_deref())
            .execute(&mut **tx)
            .await?;
        }
        Ok(id)
    }

    async fn insert_newsletter(
        tx: &mut Transaction<'_, Postgres>,
        article_id: Id,
        n: &Newsletter,
    ) -> StoreResult<Id> {
        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO newsletters (article_id, reference_date, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(article_id)
        .bind(n.reference_date)
        .bind(&n.title)
        .bind(&n.description)
        .fetch_one(&mut **tx)
        .await?;

        Self::link_newsletter_articles(tx, id, &n.articles).await?;
        Ok(id)
    }

    async fn link_newsletter_articles(
        tx: &mut Transaction<'_, Postgres>,
        newsletter_id: Id,
        article_ids: &[Id],
    ) -> StoreResult<()> {
        for article_id in article_ids {
            sqlx::query(
                "INSERT INTO newsletter_articles (newsletter_id, article_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(newsletter_id)
            .bind(article_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Registry<Party> for PgStore {
    async fn find(&self, acronym: &String) -> StoreResult<Option<Stored<Party>>> {
        let row = sqlx::query(
            "SELECT id, code, name, acronym, image_url FROM parties WHERE acronym = $1 AND active",
        )
        .bind(acronym)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| -> StoreResult<Stored<Party>> {
            Ok(Stored {
                id: row.try_get("id")?,
                value: Party {
                    code: code_of(&row)?,
                    name: row.try_get("name")?,
                    acronym: row.try_get("acronym")?,
                    image_url: row.try_get("image_url")?,
                },
            })
        })
        .transpose()
    }

    async fn insert(&self, party: &Party) -> StoreResult<Id> {
        let id = sqlx::query_scalar(
            "INSERT INTO parties (code, name, acronym, image_url) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(party.code.as_str())
        .bind(&party.name)
        .bind(&party.acronym)
        .bind(party.image_url.as_deref())
        .fetch_one(&self.db)
        .await?;
        debug!("Inserted party {} as {}", party.acronym, id);
        Ok(id)
    }

    async fn update(&self, id: Id, party: &Party) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE parties
            SET code = $1, name = $2, acronym = $3, image_url = $4, updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(party.code.as_str())
        .bind(&party.name)
        .bind(&party.acronym)
        .bind(party.image_url.as_deref())
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Registry<Deputy> for PgStore {
    async fn find(&self, code: &Code) -> StoreResult<Option<Stored<Deputy>>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, name, electoral_name, image_url, party_id, federated_unit
            FROM deputies WHERE code = $1 AND active
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| -> StoreResult<Stored<Deputy>> {
            Ok(Stored {
                id: row.try_get("id")?,
                value: Deputy {
                    code: code_of(&row)?,
                    name: row.try_get("name")?,
                    electoral_name: row.try_get("electoral_name")?,
                    image_url: row.try_get("image_url")?,
                    party_id: row.try_get("party_id")?,
                    federated_unit: row.try_get::<String, _>("federated_unit")?.trim().to_string(),
                },
            })
        })
        .transpose()
    }

    async fn insert(&self, deputy: &Deputy) -> StoreResult<Id> {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO deputies (code, name, electoral_name, image_url, party_id, federated_unit)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(deputy.code.as_str())
        .bind(&deputy.name)
        .bind(&deputy.electoral_name)
        .bind(&deputy.image_url)
        .bind(deputy.party_id)
        .bind(&deputy.federated_unit)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn update(&self, id: Id, deputy: &Deputy) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE deputies
            SET code = $1, name = $2, electoral_name = $3, image_url = $4, party_id = $5,
                federated_unit = $6, updated_at = NOW()
            WHERE id = $7
            "#,
        )
        .bind(deputy.code.as_str())
        .bind(&deputy.name)
        .bind(&deputy.electoral_name)
        .bind(&deputy.image_url)
        .bind(deputy.party_id)
        .bind(&deputy.federated_unit)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Registry<ExternalAuthor> for PgStore {
    async fn find(&self, name: &String) -> StoreResult<Option<Stored<ExternalAuthor>>> {
        let row = sqlx::query("SELECT id, name, type_id FROM external_authors WHERE name = $1 AND active")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| -> StoreResult<Stored<ExternalAuthor>> {
            Ok(Stored {
                id: row.try_get("id")?,
                value: ExternalAuthor {
                    name: row.try_get("name")?,
                    type_id: row.try_get("type_id")?,
                },
            })
        })
        .transpose()
    }

    async fn insert(&self, author: &ExternalAuthor) -> StoreResult<Id> {
        let id = sqlx::query_scalar("INSERT INTO external_authors (name, type_id) VALUES ($1, $2) RETURNING id")
            .bind(&author.name)
            .bind(author.type_id)
            .fetch_one(&self.db)
            .await?;
        Ok(id)
    }

    async fn update(&self, id: Id, author: &ExternalAuthor) -> StoreResult<()> {
        sqlx::query("UPDATE external_authors SET name = $1, type_id = $2, updated_at = NOW() WHERE id = $3")
            .bind(&author.name)
            .bind(author.type_id)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Registry<LegislativeBody> for PgStore {
    async fn find(&self, code: &Code) -> StoreResult<Option<Stored<LegislativeBody>>> {
        let row = sqlx::query("SELECT id, code, name, acronym FROM legislative_bodies WHERE code = $1 AND active")
            .bind(code.as_str())
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| -> StoreResult<Stored<LegislativeBody>> {
            Ok(Stored {
                id: row.try_get("id")?,
                value: LegislativeBody {
                    code: code_of(&row)?,
                    name: row.try_get("name")?,
                    acronym: row.try_get("acronym")?,
                },
            })
        })
        .transpose()
    }

    async fn insert(&self, body: &LegislativeBody) -> StoreResult<Id> {
        let id = sqlx::query_scalar(
            "INSERT INTO legislative_bodies (code, name, acronym) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(body.code.as_str())
        .bind(&body.name)
        .bind(&body.acronym)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn update(&self, id: Id, body: &LegislativeBody) -> StoreResult<()> {
        sqlx::query(
            "UPDATE legislative_bodies SET code = $1, name = $2, acronym = $3, updated_at = NOW() WHERE id = $4",
        )
        .bind(body.code.as_str())
        .bind(&body.name)
        .bind(&body.acronym)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn registered_codes(&self, kind: ItemKind, codes: &[Code]) -> StoreResult<HashSet<Code>> {
        if codes.is_empty() {
            return Ok(HashSet::new());
        }
        let codes: Vec<String> = codes.iter().map(|c| c.as_str().to_string()).collect();
        let query = format!(
            "SELECT code FROM {} WHERE active AND code = ANY($1)",
            table_for(kind)
        );
        let rows: Vec<String> = sqlx::query_scalar(&query)
            .bind(&codes)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Code::new).collect())
    }

    async fn classification(
        &self,
        kind: ClassificationKind,
        code: Option<&str>,
    ) -> StoreResult<Classification> {
        let code = code.map(str::trim).filter(|c| !c.is_empty());
        let row = sqlx::query(
            r#"
            SELECT id, is_default FROM classifications
            WHERE kind = $1 AND active AND (
                is_default OR EXISTS (
                    SELECT 1 FROM unnest(string_to_array(codes, ';')) AS c(value)
                    WHERE trim(c.value) = $2
                )
            )
            ORDER BY is_default ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(Classification {
                id: row.try_get("id")?,
                is_default: row.try_get("is_default")?,
            }),
            None => Err(StoreError::MissingDefault(kind)),
        }
    }

    async fn find_proposition(&self, code: &Code) -> StoreResult<Option<Stored<PropositionClassification>>> {
        let row = sqlx::query("SELECT id, type_id, specific_type FROM propositions WHERE code = $1 AND active")
            .bind(code.as_str())
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| -> StoreResult<Stored<PropositionClassification>> {
            Ok(Stored {
                id: row.try_get("id")?,
                value: PropositionClassification {
                    type_id: row.try_get("type_id")?,
                    specific_type: row.try_get("specific_type")?,
                },
            })
        })
        .transpose()
    }

    async fn update_proposition_classification(
        &self,
        id: Id,
        classification: &PropositionClassification,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE propositions SET type_id = $1, specific_type = $2, updated_at = NOW() WHERE id = $3")
            .bind(classification.type_id)
            .bind(&classification.specific_type)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_event(&self, code: &Code) -> StoreResult<Option<Stored<EventSchedule>>> {
        let row = sqlx::query("SELECT id, situation_id, starts_at, ends_at FROM events WHERE code = $1 AND active")
            .bind(code.as_str())
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| -> StoreResult<Stored<EventSchedule>> {
            Ok(Stored {
                id: row.try_get("id")?,
                value: EventSchedule {
                    situation_id: row.try_get("situation_id")?,
                    starts_at: row.try_get("starts_at")?,
                    ends_at: row.try_get("ends_at")?,
                },
            })
        })
        .transpose()
    }

    async fn update_event_schedule(&self, id: Id, schedule: &EventSchedule) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET situation_id = $1, starts_at = $2, ends_at = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(schedule.situation_id)
        .bind(schedule.starts_at)
        .bind(schedule.ends_at)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn open_event_codes(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<Vec<Code>> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT code FROM events
            WHERE active AND starts_at >= $1 AND (ends_at IS NULL OR ends_at > $2)
            ORDER BY starts_at, id
            "#,
        )
        .bind(since)
        .bind(now)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Code::new).collect())
    }

    async fn find_voting(&self, code: &Code) -> StoreResult<Option<Id>> {
        let id = sqlx::query_scalar("SELECT id FROM votings WHERE code = $1 AND active")
            .bind(code.as_str())
            .fetch_optional(&self.db)
            .await?;
        Ok(id)
    }

    async fn register_article(&self, article: &Article) -> StoreResult<RegisteredArticle> {
        let mut tx = self.db.begin().await?;
        let article_id = Self::insert_article_row(&mut tx, article).await?;

        let entity_id = match &article.payload {
            ArticlePayload::Proposition(p) => Self::insert_proposition(&mut tx, article_id, p).await?,
            ArticlePayload::Voting(v) => Self::insert_voting(&mut tx, article_id, v).await?,
            ArticlePayload::Event(e) => Self::insert_event(&mut tx, article_id, e).await?,
            ArticlePayload::Newsletter(n) => Self::insert_newsletter(&mut tx, article_id, n).await?,
        };

        tx.commit().await?;
        debug!("Registered {} article {} (entity {})", article.kind(), article_id, entity_id);
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
        let rows = sqlx::query(
            r#"
            SELECT a.id AS article_id, a.kind, a.reference_at, p.title, p.summary AS content,
                   NOT c.is_default AS has_specific_type
            FROM articles a
            JOIN propositions p ON p.article_id = a.id
            JOIN classifications c ON c.id = p.type_id
            WHERE a.active AND a.reference_at >= $1 AND a.reference_at < $2
            UNION ALL
            SELECT a.id, a.kind, a.reference_at, e.title, e.description, NOT c.is_default
            FROM articles a
            JOIN events e ON e.article_id = a.id
            JOIN classifications c ON c.id = e.type_id
            WHERE a.active AND a.reference_at >= $1 AND a.reference_at < $2
            UNION ALL
            SELECT a.id, a.kind, a.reference_at, 'Votação ' || v.code, v.result_description, FALSE
            FROM articles a
            JOIN votings v ON v.article_id = a.id
            WHERE a.active AND a.reference_at >= $1 AND a.reference_at < $2
            ORDER BY reference_at, article_id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<ArticleSummary> {
                let kind: String = row.try_get("kind")?;
                Ok(ArticleSummary {
                    article_id: row.try_get("article_id")?,
                    kind: kind.parse::<ArticleKind>().map_err(StoreError::Query)?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    reference_at: row.try_get("reference_at")?,
                    has_specific_type: row.try_get("has_specific_type")?,
                })
            })
            .collect()
    }

    async fn find_newsletter(&self, date: NaiveDate) -> StoreResult<Option<StoredNewsletter>> {
        let Some(row) = sqlx::query(
            "SELECT id, article_id, title, description FROM newsletters WHERE reference_date = $1 AND active",
        )
        .bind(date)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };

        let id: Id = row.try_get("id")?;
        let articles: Vec<Id> = sqlx::query_scalar(
            "SELECT article_id FROM newsletter_articles WHERE newsletter_id = $1 ORDER BY article_id",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(StoredNewsletter {
            id,
            article_id: row.try_get("article_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            articles,
        }))
    }

    async fn append_newsletter_articles(
        &self,
        newsletter_id: Id,
        article_ids: &[Id],
        title: &str,
        description: &str,
    ) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        Self::link_newsletter_articles(&mut tx, newsletter_id, article_ids).await?;
        sqlx::query("UPDATE newsletters SET title = $1, description = $2, updated_at = NOW() WHERE id = $3")
            .bind(title)
            .bind(description)
            .bind(newsletter_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
