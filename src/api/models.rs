//! Wire payloads of the Cartola market API.
//!
//! Upstream fields are frequently null or missing, so almost everything except
//! natural keys is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Competition round identifier (`rodada`).
pub type PeriodId = i64;

/// `GET /mercado/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketStatus {
    #[serde(default)]
    pub rodada_atual: Option<PeriodId>,
    #[serde(default)]
    pub temporada: Option<i32>,
    #[serde(default)]
    pub status_mercado: Option<i64>,
    /// Some deployments nest the round under `mercado`.
    #[serde(default)]
    pub mercado: Option<NestedMarket>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NestedMarket {
    #[serde(default)]
    pub rodada_atual: Option<PeriodId>,
}

impl MarketStatus {
    /// Current round, preferring the top-level field over the nested one.
    pub fn current_period(&self) -> Option<PeriodId> {
        self.rodada_atual
            .or_else(|| self.mercado.as_ref().and_then(|m| m.rodada_atual))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Athlete {
    pub atleta_id: i64,
    #[serde(default)]
    pub clube_id: Option<i64>,
    #[serde(default)]
    pub posicao_id: Option<i64>,
    #[serde(default)]
    pub status_id: Option<i64>,
    #[serde(default)]
    pub pontos_num: Option<f64>,
    #[serde(default)]
    pub media_num: Option<f64>,
    #[serde(default)]
    pub variacao_num: Option<f64>,
    #[serde(default)]
    pub preco_num: Option<f64>,
    #[serde(default)]
    pub jogos_num: Option<i64>,
    #[serde(default)]
    pub entrou_em_campo: Option<bool>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub apelido: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub foto: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Club {
    pub id: i64,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub abreviacao: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub apelido: Option<String>,
    #[serde(default)]
    pub nome_fantasia: Option<String>,
    #[serde(default)]
    pub url_editoria: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: i64,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub abreviacao: Option<String>,
}

/// Athlete availability status (e.g. "Provável", "Contundido").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AthleteStatus {
    pub id: i64,
    #[serde(default)]
    pub nome: Option<String>,
}

/// `GET /atletas/mercado`: the live snapshot plus the taxonomies it references.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketResponse {
    #[serde(default)]
    pub atletas: Vec<Athlete>,
    #[serde(default)]
    pub clubes: BTreeMap<String, Club>,
    #[serde(default)]
    pub posicoes: BTreeMap<String, Position>,
    #[serde(default)]
    pub status: BTreeMap<String, AthleteStatus>,
}

/// Per-round scouting counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Scout {
    #[serde(rename = "A")]
    pub a: i64,
    #[serde(rename = "CA")]
    pub ca: i64,
    #[serde(rename = "CV")]
    pub cv: i64,
    #[serde(rename = "DE")]
    pub de: i64,
    #[serde(rename = "DS")]
    pub ds: i64,
    #[serde(rename = "FC")]
    pub fc: i64,
    #[serde(rename = "FD")]
    pub fd: i64,
    #[serde(rename = "FF")]
    pub ff: i64,
    #[serde(rename = "FS")]
    pub fs: i64,
    #[serde(rename = "G")]
    pub g: i64,
    #[serde(rename = "GS")]
    pub gs: i64,
    #[serde(rename = "I")]
    pub i: i64,
    #[serde(rename = "SG")]
    pub sg: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredAthlete {
    #[serde(default)]
    pub clube_id: Option<i64>,
    #[serde(default)]
    pub posicao_id: Option<i64>,
    #[serde(default)]
    pub pontuacao: Option<f64>,
    #[serde(default)]
    pub entrou_em_campo: Option<bool>,
    #[serde(default)]
    pub apelido: Option<String>,
    #[serde(default)]
    pub foto: Option<String>,
    #[serde(default)]
    pub scout: Option<Scout>,
}

/// `GET /atletas/pontuados/{rodada}`; athletes are keyed by their id as a string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoredResponse {
    #[serde(default)]
    pub atletas: BTreeMap<String, ScoredAthlete>,
    #[serde(default)]
    pub rodada: Option<PeriodId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub partida_id: i64,
    #[serde(default)]
    pub clube_casa_id: Option<i64>,
    #[serde(default)]
    pub clube_visitante_id: Option<i64>,
    #[serde(default)]
    pub placar_oficial_mandante: Option<i64>,
    #[serde(default)]
    pub placar_oficial_visitante: Option<i64>,
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub partida_data: Option<String>,
    #[serde(default)]
    pub valida: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// `GET /partidas/{rodada}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchesResponse {
    #[serde(default)]
    pub partidas: Vec<Match>,
    #[serde(default)]
    pub rodada: Option<PeriodId>,
}

/// Slot counts per position in a formation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormationSlots {
    pub ata: i64,
    pub gol: i64,
    pub lat: i64,
    pub mei: i64,
    pub tec: i64,
    pub zag: i64,
}

/// One entry of `GET /esquemas`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Formation {
    pub esquema_id: i64,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub posicoes: FormationSlots,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightAthlete {
    pub atleta_id: i64,
    #[serde(default)]
    pub apelido: Option<String>,
    #[serde(default)]
    pub preco_editorial: Option<f64>,
}

/// One entry of `GET /auth/mercado/destaques`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Highlight {
    #[serde(rename = "Atleta")]
    pub atleta: HighlightAthlete,
    #[serde(default)]
    pub posicao: Option<String>,
    #[serde(default)]
    pub posicao_abreviacao: Option<String>,
    #[serde(default)]
    pub clube_id: Option<i64>,
    #[serde(default)]
    pub clube: Option<String>,
    #[serde(default)]
    pub escalacoes: Option<i64>,
}
