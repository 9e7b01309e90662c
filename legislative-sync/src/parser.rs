//! Wire format of the Câmara dos Deputados open-data API (v2) and its
//! conversion into upstream records.
//!
//! Every response wraps its payload in `{"dados": ...}`. Timestamps carry
//! no zone and are local time.

use chrono::{DateTime, FixedOffset, Utc};
use interfaces::upstream::{
    UpstreamAgendaItem, UpstreamAuthor, UpstreamDeputy, UpstreamEvent, UpstreamLegislativeBody,
    UpstreamParty, UpstreamProposition, UpstreamVoting,
};
use interfaces::{Code, ServiceError, ServiceResult};
use serde::Deserialize;

use crate::utils::parse_local_datetime;

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub dados: T,
}

/// Upstream ids are numbers for most resources and strings for votings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for Code {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Number(n) => Code::from(n),
            RawId::Text(s) => Code::from(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListedItem {
    pub id: RawId,
}

fn timestamp(raw: &str, field: &str, tz: FixedOffset) -> ServiceResult<DateTime<Utc>> {
    parse_local_datetime(raw, tz)
        .ok_or_else(|| ServiceError::Malformed(format!("{}: unparseable timestamp '{}'", field, raw)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Trailing numeric id of a resource URI such as `.../deputados/204554`.
pub fn id_from_uri(uri: &str, segment: &str) -> Option<Code> {
    let marker = format!("/{}/", segment);
    let start = uri.find(&marker)? + marker.len();
    let id = uri[start..].split(['/', '?']).next()?.trim();
    (!id.is_empty()).then(|| Code::from(id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropositionDetail {
    pub id: i64,
    pub sigla_tipo: Option<String>,
    pub cod_tipo: Option<i64>,
    pub descricao_tipo: Option<String>,
    pub ementa: Option<String>,
    pub data_apresentacao: String,
    pub url_inteiro_teor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropositionAuthor {
    pub uri: Option<String>,
    pub nome: String,
    pub cod_tipo: Option<i64>,
    pub tipo: Option<String>,
}

impl PropositionDetail {
    pub fn into_upstream(
        self,
        authors: Vec<PropositionAuthor>,
        tz: FixedOffset,
    ) -> ServiceResult<UpstreamProposition> {
        let authors = authors
            .into_iter()
            .map(|a| match a.uri.as_deref().and_then(|uri| id_from_uri(uri, "deputados")) {
                Some(code) => UpstreamAuthor::Deputy { code },
                None => UpstreamAuthor::External {
                    name: a.nome.trim().to_string(),
                    type_code: a
                        .cod_tipo
                        .map(|c| c.to_string())
                        .or(a.tipo)
                        .unwrap_or_default(),
                },
            })
            .collect();

        Ok(UpstreamProposition {
            code: Code::from(self.id),
            type_code: self
                .cod_tipo
                .map(|c| c.to_string())
                .or(self.sigla_tipo.clone())
                .unwrap_or_default(),
            specific_type: non_blank(self.descricao_tipo).or(self.sigla_tipo).unwrap_or_default(),
            summary: self.ementa.unwrap_or_default(),
            submitted_at: timestamp(&self.data_apresentacao, "dataApresentacao", tz)?,
            original_text_url: non_blank(self.url_inteiro_teor),
            authors,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeputyStatus {
    pub nome: Option<String>,
    pub nome_eleitoral: Option<String>,
    pub sigla_partido: Option<String>,
    pub sigla_uf: Option<String>,
    pub url_foto: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeputyDetail {
    pub id: i64,
    pub nome_civil: Option<String>,
    pub ultimo_status: DeputyStatus,
}

impl DeputyDetail {
    pub fn into_upstream(self) -> UpstreamDeputy {
        let status = self.ultimo_status;
        let name = non_blank(self.nome_civil).or(status.nome.clone()).unwrap_or_default();
        UpstreamDeputy {
            code: Code::from(self.id),
            electoral_name: non_blank(status.nome_eleitoral).or(status.nome).unwrap_or_else(|| name.clone()),
            name,
            image_url: status.url_foto.unwrap_or_default(),
            party_acronym: status.sigla_partido.unwrap_or_default(),
            federated_unit: status.sigla_uf.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyDetail {
    pub id: i64,
    pub sigla: String,
    pub nome: String,
    pub url_logo: Option<String>,
}

impl PartyDetail {
    pub fn into_upstream(self) -> UpstreamParty {
        UpstreamParty {
            code: Code::from(self.id),
            name: self.nome,
            acronym: self.sigla,
            image_url: non_blank(self.url_logo),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDetail {
    pub id: i64,
    pub sigla: Option<String>,
    pub nome: Option<String>,
    pub apelido: Option<String>,
}

impl BodyDetail {
    pub fn into_upstream(self) -> UpstreamLegislativeBody {
        let name = non_blank(self.nome).or(self.apelido).unwrap_or_default();
        UpstreamLegislativeBody {
            code: Code::from(self.id),
            acronym: non_blank(self.sigla).unwrap_or_else(|| name.clone()),
            name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventPlace {
    pub nome: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct EventRequirement {
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub id: i64,
    pub data_hora_inicio: String,
    pub data_hora_fim: Option<String>,
    pub situacao: Option<String>,
    pub descricao_tipo: Option<String>,
    pub descricao: Option<String>,
    pub local_camara: Option<EventPlace>,
    pub local_externo: Option<String>,
    #[serde(default)]
    pub orgaos: Vec<EventBody>,
    pub url_registro: Option<String>,
    #[serde(default)]
    pub requerimentos: Vec<EventRequirement>,
}

#[derive(Debug, Deserialize)]
pub struct AgendaProposition {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AgendaRapporteur {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaEntry {
    pub titulo: Option<String>,
    pub topico: Option<String>,
    pub cod_regime: Option<i64>,
    pub regime: Option<String>,
    pub relator: Option<AgendaRapporteur>,
    #[serde(rename = "proposicao_")]
    pub proposicao: Option<AgendaProposition>,
    #[serde(rename = "proposicaoRelacionada_")]
    pub proposicao_relacionada: Option<AgendaProposition>,
    pub uri_votacao: Option<String>,
    pub situacao_item: Option<String>,
}

impl AgendaEntry {
    fn into_upstream(self) -> UpstreamAgendaItem {
        UpstreamAgendaItem {
            title: self.titulo.unwrap_or_default(),
            topic: self.topico.unwrap_or_default(),
            regime_code: self.cod_regime.map(|c| c.to_string()).or(non_blank(self.regime)),
            rapporteur: self.relator.map(|r| Code::from(r.id)),
            proposition: self.proposicao.map(|p| Code::from(p.id)),
            related_proposition: self.proposicao_relacionada.map(|p| Code::from(p.id)),
            voting: self
                .uri_votacao
                .as_deref()
                .and_then(|uri| id_from_uri(uri, "votacoes")),
            situation: non_blank(self.situacao_item),
        }
    }
}

impl EventDetail {
    pub fn into_upstream(self, agenda: Vec<AgendaEntry>, tz: FixedOffset) -> ServiceResult<UpstreamEvent> {
        let starts_at = timestamp(&self.data_hora_inicio, "dataHoraInicio", tz)?;
        let ends_at = match non_blank(self.data_hora_fim) {
            Some(raw) => Some(timestamp(&raw, "dataHoraFim", tz)?),
            None => None,
        };
        let external = non_blank(self.local_externo);
        let location = self
            .local_camara
            .and_then(|l| non_blank(l.nome))
            .or(external.clone())
            .unwrap_or_default();
        let title = self.descricao_tipo.clone().unwrap_or_default();

        Ok(UpstreamEvent {
            code: Code::from(self.id),
            title,
            description: self.descricao.unwrap_or_default(),
            starts_at,
            ends_at,
            location,
            is_internal: external.is_none(),
            video_url: non_blank(self.url_registro),
            type_code: non_blank(self.descricao_tipo),
            situation: non_blank(self.situacao),
            legislative_bodies: self.orgaos.into_iter().map(|o| Code::from(o.id)).collect(),
            requirements: self
                .requerimentos
                .into_iter()
                .filter_map(|r| r.uri.as_deref().and_then(|uri| id_from_uri(uri, "proposicoes")))
                .collect(),
            agenda: agenda.into_iter().map(AgendaEntry::into_upstream).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingProposition {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPresentation {
    pub uri_proposicao_citada: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingDetail {
    pub id: String,
    pub data_hora_registro: Option<String>,
    pub data: Option<String>,
    pub descricao: Option<String>,
    pub aprovacao: Option<i64>,
    pub id_orgao: Option<i64>,
    #[serde(default)]
    pub proposicoes_afetadas: Vec<VotingProposition>,
    #[serde(default)]
    pub objetos_possiveis: Vec<VotingProposition>,
    pub ultima_apresentacao_proposicao: Option<LastPresentation>,
}

impl VotingDetail {
    pub fn into_upstream(self, tz: FixedOffset) -> ServiceResult<UpstreamVoting> {
        let raw_at = non_blank(self.data_hora_registro)
            .or(non_blank(self.data))
            .ok_or_else(|| ServiceError::Malformed(format!("voting {} has no timestamp", self.id)))?;
        let main_proposition = self
            .ultima_apresentacao_proposicao
            .and_then(|p| p.uri_proposicao_citada)
            .and_then(|uri| id_from_uri(&uri, "proposicoes"))
            .filter(|code| code.as_str() != "0");

        Ok(UpstreamVoting {
            code: Code::from(self.id),
            description: self.descricao.unwrap_or_default(),
            result_at: timestamp(&raw_at, "dataHoraRegistro", tz)?,
            approved: self.aprovacao.map(|a| a == 1),
            legislative_body: self.id_orgao.map(Code::from),
            main_proposition,
            related_propositions: self.objetos_possiveis.into_iter().map(|p| Code::from(p.id)).collect(),
            affected_propositions: self.proposicoes_afetadas.into_iter().map(|p| Code::from(p.id)).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyListing {
    pub id: i64,
    pub sigla: String,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceEntry {
    pub cod: RawId,
    pub sigla: Option<String>,
    pub nome: Option<String>,
    pub descricao: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn deputy_authors_are_recognized_by_uri() {
        let detail: Envelope<PropositionDetail> = serde_json::from_str(
            r#"{"dados": {
                "id": 2390000, "siglaTipo": "PL", "codTipo": 139,
                "descricaoTipo": "Projeto de Lei", "ementa": "Altera a Lei nº 8.078",
                "dataApresentacao": "2024-05-10T14:30",
                "urlInteiroTeor": "https://www.camara.leg.br/proposicoesWeb/prop_mostrarintegra?codteor=1"
            }}"#,
        )
        .unwrap();
        let authors: Envelope<Vec<PropositionAuthor>> = serde_json::from_str(
            r#"{"dados": [
                {"uri": "https://dadosabertos.camara.leg.br/api/v2/deputados/204554", "nome": "Fulana", "codTipo": 10000, "tipo": "Deputado(a)"},
                {"uri": null, "nome": "Poder Executivo", "codTipo": 2, "tipo": "Órgão do Poder Executivo"}
            ]}"#,
        )
        .unwrap();

        let p = detail.dados.into_upstream(authors.dados, brt()).unwrap();
        assert_eq!(p.code, Code::from(2390000));
        assert_eq!(p.type_code, "139");
        assert_eq!(p.submitted_at, Utc.with_ymd_and_hms(2024, 5, 10, 17, 30, 0).unwrap());
        assert_eq!(
            p.authors,
            vec![
                UpstreamAuthor::Deputy { code: Code::from(204554) },
                UpstreamAuthor::External {
                    name: "Poder Executivo".into(),
                    type_code: "2".into()
                },
            ]
        );
    }

    #[test]
    fn voting_ids_are_strings_and_approval_may_be_missing() {
        let detail: Envelope<VotingDetail> = serde_json::from_str(
            r#"{"dados": {
                "id": "2265603-43", "dataHoraRegistro": "2024-05-10T18:02:11",
                "descricao": "Aprovado o requerimento", "aprovacao": null, "idOrgao": 180,
                "proposicoesAfetadas": [{"id": 2265603}], "objetosPossiveis": []
            }}"#,
        )
        .unwrap();
        let v = detail.dados.into_upstream(brt()).unwrap();
        assert_eq!(v.code.as_str(), "2265603-43");
        assert_eq!(v.approved, None);
        assert_eq!(v.legislative_body, Some(Code::from(180)));
        assert_eq!(v.affected_propositions, vec![Code::from(2265603)]);
    }

    #[test]
    fn uri_ids_are_extracted() {
        assert_eq!(
            id_from_uri("https://dadosabertos.camara.leg.br/api/v2/proposicoes/123?x=1", "proposicoes"),
            Some(Code::from(123))
        );
        assert_eq!(id_from_uri("https://example.org/orgaos/5", "deputados"), None);
    }
}
