//! Daily newsletter: picks the day's most relevant articles and writes a
//! digest title and description for them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use interfaces::defs::{Article, ArticleSummary, Newsletter};
use interfaces::Id;
use tracing::{debug, info, instrument};

use crate::llm_adapter::{prompts, Summarizer};
use crate::retry::RetryPolicy;
use crate::store::{Store, StoreError};
use crate::types::{Result, SyncError};
use crate::utils::{day_bounds, strip_quotes};

/// What a newsletter build did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsletterOutcome {
    Created { id: Id, articles: usize },
    Appended { id: Id, added: usize },
    /// Every candidate of the day is already linked, or the newsletter is full.
    Unchanged { id: Id },
    /// Nothing was published on the day.
    NoArticles,
}

impl NewsletterOutcome {
    pub fn linked(&self) -> usize {
        match self {
            NewsletterOutcome::Created { articles, .. } => *articles,
            NewsletterOutcome::Appended { added, .. } => *added,
            _ => 0,
        }
    }
}

/// Up to `limit` articles: specific-type ones first, then fallback-type
/// ones, each group in its original order.
pub fn select_articles(candidates: &[ArticleSummary], limit: usize) -> Vec<ArticleSummary> {
    if candidates.len() <= limit {
        return candidates.to_vec();
    }
    let specific = candidates.iter().filter(|a| a.has_specific_type);
    let fallback = candidates.iter().filter(|a| !a.has_specific_type);
    specific.chain(fallback).take(limit).cloned().collect()
}

/// Title and content of every selected article, in order.
fn digest_input(articles: &[&ArticleSummary]) -> String {
    articles
        .iter()
        .map(|a| format!("{}\n{}", a.title, a.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct ArticleAggregator {
    store: Arc<dyn Store>,
    summarizer: Summarizer,
    retry: RetryPolicy,
    max_articles: usize,
    timezone: FixedOffset,
}

impl ArticleAggregator {
    pub fn new(
        store: Arc<dyn Store>,
        summarizer: Summarizer,
        retry: RetryPolicy,
        max_articles: usize,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            store,
            summarizer,
            retry,
            max_articles: max_articles.max(1),
            timezone,
        }
    }

    /// Creates the newsletter of `date`, or appends the day's new articles
    /// to the existing one. Retried as a whole.
    #[instrument(skip(self), fields(kind = "newsletter"))]
    pub async fn build_for(&self, date: NaiveDate) -> Result<NewsletterOutcome> {
        let label = format!("newsletter {}", date);
        let outcome = self.retry.run(&label, |_| self.build_once(date)).await?;
        match &outcome {
            NewsletterOutcome::Created { id, articles } => {
                info!(id, "Created newsletter for {} with {} articles", date, articles)
            }
            NewsletterOutcome::Appended { id, added } => {
                info!(id, "Added {} articles to the newsletter for {}", added, date)
            }
            NewsletterOutcome::Unchanged { id } => debug!(id, "Newsletter for {} is up to date", date),
            NewsletterOutcome::NoArticles => info!("No articles published on {}, no newsletter", date),
        }
        Ok(outcome)
    }

    async fn build_once(&self, date: NaiveDate) -> Result<NewsletterOutcome> {
        let (from, to) = day_bounds(date, self.timezone);
        let candidates = self.store.articles_between(from, to).await?;

        let Some(existing) = self.store.find_newsletter(date).await? else {
            if candidates.is_empty() {
                return Ok(NewsletterOutcome::NoArticles);
            }
            return self.create(date, from, &candidates).await;
        };

        let linked: HashSet<Id> = existing.articles.iter().copied().collect();
        let delta: Vec<ArticleSummary> = candidates
            .iter()
            .filter(|a| !linked.contains(&a.article_id))
            .cloned()
            .collect();
        let room = self.max_articles.saturating_sub(linked.len());
        if delta.is_empty() || room == 0 {
            return Ok(NewsletterOutcome::Unchanged { id: existing.id });
        }

        let added = select_articles(&delta, room);
        let added_ids: Vec<Id> = added.iter().map(|a| a.article_id).collect();
        let all: Vec<&ArticleSummary> = candidates
            .iter()
            .filter(|a| linked.contains(&a.article_id) || added_ids.contains(&a.article_id))
            .collect();

        let (title, description) = self.digest(&all).await?;
        self.store
            .append_newsletter_articles(existing.id, &added_ids, &title, &description)
            .await?;
        Ok(NewsletterOutcome::Appended {
            id: existing.id,
            added: added_ids.len(),
        })
    }

    async fn create(
        &self,
        date: NaiveDate,
        reference_at: DateTime<Utc>,
        candidates: &[ArticleSummary],
    ) -> Result<NewsletterOutcome> {
        let selected = select_articles(candidates, self.max_articles);
        let refs: Vec<&ArticleSummary> = selected.iter().collect();
        let (title, description) = self.digest(&refs).await?;

        let ids: Vec<Id> = selected.iter().map(|a| a.article_id).collect();
        let newsletter = Newsletter::new(date, title, description, ids)?;
        let articles = newsletter.articles.len();
        match self
            .store
            .register_article(&Article::newsletter(newsletter, reference_at))
            .await
        {
            Ok(registered) => Ok(NewsletterOutcome::Created {
                id: registered.entity_id,
                articles,
            }),
            // Someone else created it; the next attempt appends instead.
            Err(StoreError::Conflict(what)) => Err(SyncError::PersistenceConflict(what)),
            Err(e) => Err(e.into()),
        }
    }

    /// Description first, then a title written from the description.
    async fn digest(&self, articles: &[&ArticleSummary]) -> Result<(String, String)> {
        let description = self
            .summarizer
            .summarize(prompts::NEWSLETTER_DESCRIPTION, &digest_input(articles), "newsletter description")
            .await?;
        let description = strip_quotes(&description);
        let title = self
            .summarizer
            .summarize(prompts::NEWSLETTER_TITLE, &description, "newsletter title")
            .await?;
        Ok((strip_quotes(&title), description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use interfaces::defs::ArticleKind;

    fn summary(article_id: Id, has_specific_type: bool) -> ArticleSummary {
        ArticleSummary {
            article_id,
            kind: ArticleKind::Proposition,
            title: format!("Artigo {}", article_id),
            content: "Resumo".to_string(),
            reference_at: Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
            has_specific_type,
        }
    }

    #[test]
    fn small_candidate_sets_are_kept_whole() {
        let candidates = vec![summary(1, false), summary(2, true)];
        let ids: Vec<Id> = select_articles(&candidates, 10).iter().map(|a| a.article_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn specific_types_fill_the_slots_first() {
        let candidates = vec![
            summary(1, false),
            summary(2, true),
            summary(3, false),
            summary(4, true),
        ];
        let ids: Vec<Id> = select_articles(&candidates, 3).iter().map(|a| a.article_id).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }
}
