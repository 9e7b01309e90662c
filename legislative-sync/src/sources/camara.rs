use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use interfaces::defs::{ClassificationKind, ItemKind};
use interfaces::services::{CatalogEntry, LegislativeSource};
use interfaces::upstream::{
    UpstreamDeputy, UpstreamEvent, UpstreamLegislativeBody, UpstreamParty, UpstreamProposition,
    UpstreamVoting,
};
use interfaces::{Code, ServiceError, ServiceResult};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::fetcher::Fetcher;
use crate::parser::{
    AgendaEntry, BodyDetail, DeputyDetail, Envelope, EventDetail, ListedItem, PartyDetail,
    PartyListing, PropositionAuthor, PropositionDetail, ReferenceEntry, VotingDetail,
};
use crate::types::{FetchConfig, Result};
use crate::utils::normalize_party_acronym;

/// [`LegislativeSource`] over the Câmara dos Deputados open-data API.
pub struct CamaraSource {
    base_url: String,
    fetcher: Fetcher,
    timezone: FixedOffset,
}

impl CamaraSource {
    pub fn new(base_url: &str, fetch_config: FetchConfig, timezone: FixedOffset) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            fetcher: Fetcher::new(fetch_config)?,
            timezone,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> ServiceResult<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| ServiceError::Malformed(format!("bad endpoint {}: {}", path, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ServiceResult<T> {
        let url = self.endpoint(path, query)?;
        let envelope: Envelope<T> = self.fetcher.get_json(&url).await?;
        Ok(envelope.dados)
    }
}

fn listing_path(kind: ItemKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        ItemKind::Proposition => ("proposicoes", "dataApresentacaoInicio", "id"),
        ItemKind::Voting => ("votacoes", "dataInicio", "dataHoraRegistro"),
        ItemKind::Event => ("eventos", "dataInicio", "dataHoraInicio"),
    }
}

fn catalog_path(kind: ClassificationKind) -> Option<&'static str> {
    match kind {
        ClassificationKind::PropositionType => Some("referencias/proposicoes/codTipo"),
        ClassificationKind::EventType => Some("referencias/eventos/codTipoEvento"),
        ClassificationKind::EventSituation => Some("referencias/eventos/codSituacaoEvento"),
        ClassificationKind::ExternalAuthorType => Some("referencias/proposicoes/codTipoAutor"),
        ClassificationKind::AgendaRegime => None,
    }
}

#[async_trait]
impl LegislativeSource for CamaraSource {
    async fn list_recent(
        &self,
        kind: ItemKind,
        since: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> ServiceResult<Vec<Code>> {
        let (path, since_param, order_by) = listing_path(kind);
        let items: Vec<ListedItem> = self
            .get(
                path,
                &[
                    (since_param, since.format("%Y-%m-%d").to_string()),
                    ("ordem", "ASC".to_string()),
                    ("ordenarPor", order_by.to_string()),
                    ("itens", page_size.to_string()),
                    ("pagina", page.to_string()),
                ],
            )
            .await?;
        debug!("Listed {} {} codes on page {}", items.len(), kind, page);
        Ok(items.into_iter().map(|item| Code::from(item.id)).collect())
    }

    async fn proposition(&self, code: &Code) -> ServiceResult<UpstreamProposition> {
        let detail: PropositionDetail = self.get(&format!("proposicoes/{}", code), &[]).await?;
        let authors: Vec<PropositionAuthor> =
            self.get(&format!("proposicoes/{}/autores", code), &[]).await?;
        detail.into_upstream(authors, self.timezone)
    }

    async fn deputy(&self, code: &Code) -> ServiceResult<UpstreamDeputy> {
        let detail: DeputyDetail = self.get(&format!("deputados/{}", code), &[]).await?;
        Ok(detail.into_upstream())
    }

    async fn party(&self, acronym: &str) -> ServiceResult<UpstreamParty> {
        let wanted = normalize_party_acronym(acronym);
        let listing: Vec<PartyListing> = self
            .get("partidos", &[("sigla", wanted.clone()), ("itens", "100".to_string())])
            .await?;
        let listed = listing
            .into_iter()
            .find(|p| normalize_party_acronym(&p.sigla) == wanted)
            .ok_or_else(|| ServiceError::NotFound(format!("party {}", wanted)))?;
        let detail: PartyDetail = self.get(&format!("partidos/{}", listed.id), &[]).await?;
        Ok(detail.into_upstream())
    }

    async fn legislative_body(&self, code: &Code) -> ServiceResult<UpstreamLegislativeBody> {
        let detail: BodyDetail = self.get(&format!("orgaos/{}", code), &[]).await?;
        Ok(detail.into_upstream())
    }

    async fn event(&self, code: &Code) -> ServiceResult<UpstreamEvent> {
        let detail: EventDetail = self.get(&format!("eventos/{}", code), &[]).await?;
        let agenda: Vec<AgendaEntry> = self.get(&format!("eventos/{}/pauta", code), &[]).await?;
        detail.into_upstream(agenda, self.timezone)
    }

    async fn voting(&self, code: &Code) -> ServiceResult<UpstreamVoting> {
        let detail: VotingDetail = self.get(&format!("votacoes/{}", code), &[]).await?;
        detail.into_upstream(self.timezone)
    }

    async fn types_catalog(&self, kind: ClassificationKind) -> ServiceResult<Vec<CatalogEntry>> {
        let path = catalog_path(kind)
            .ok_or_else(|| ServiceError::Unsupported(format!("no upstream catalog for {}", kind)))?;
        let entries: Vec<ReferenceEntry> = self.get(path, &[]).await?;
        Ok(entries
            .into_iter()
            .map(|e| CatalogEntry {
                code: Code::from(e.cod).to_string(),
                description: e.nome.or(e.descricao).or(e.sigla).unwrap_or_default(),
            })
            .collect())
    }
}
