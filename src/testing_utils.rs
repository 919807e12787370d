use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::api::CartolaApi;
use crate::api::models::{
    Athlete, AthleteStatus, Club, Formation, FormationSlots, Highlight, HighlightAthlete,
    MarketResponse, MarketStatus, Match, MatchesResponse, PeriodId, Position, Scout,
    ScoredAthlete, ScoredResponse,
};
use crate::credentials::{
    Credential, CredentialError, CredentialStore, RefreshedTokens, TokenRefresher, TokenTriple,
};
use crate::error::AppError;

/// Test utilities for creating mock payloads and testing scenarios
pub struct TestDataBuilder;

impl TestDataBuilder {
    /// Status payload as served by `/mercado/status`
    pub fn status_payload(period: PeriodId, season: i32) -> Value {
        json!({
            "rodada_atual": period,
            "temporada": season,
            "status_mercado": 1
        })
    }

    /// Market snapshot with `athletes` athletes spread over `clubs` clubs
    pub fn market(athletes: usize, clubs: usize) -> MarketResponse {
        let club_ids: Vec<i64> = (0..clubs as i64).map(|i| 260 + i).collect();

        let atletas = (0..athletes as i64)
            .map(|i| Athlete {
                atleta_id: 1000 + i,
                clube_id: club_ids.get(i as usize % clubs.max(1)).copied(),
                posicao_id: Some(1 + i % 6),
                status_id: Some(7),
                pontos_num: Some(2.5),
                media_num: Some(3.1),
                variacao_num: Some(0.4),
                preco_num: Some(8.0 + i as f64),
                jogos_num: Some(10),
                entrou_em_campo: Some(true),
                slug: Some(format!("atleta-{i}")),
                apelido: Some(format!("Atleta {i}")),
                nome: Some(format!("Atleta Completo {i}")),
                foto: None,
            })
            .collect();

        let clubes = club_ids
            .iter()
            .map(|&id| {
                (
                    id.to_string(),
                    Club {
                        id,
                        nome: Some(format!("Clube {id}")),
                        abreviacao: Some(format!("C{id}")),
                        slug: Some(format!("clube-{id}")),
                        apelido: None,
                        nome_fantasia: Some(format!("Clube {id}")),
                        url_editoria: None,
                    },
                )
            })
            .collect();

        let posicoes = [
            (1, "Goleiro", "gol"),
            (2, "Lateral", "lat"),
            (3, "Zagueiro", "zag"),
            (4, "Meia", "mei"),
            (5, "Atacante", "ata"),
            (6, "Técnico", "tec"),
        ]
        .into_iter()
        .map(|(id, nome, abreviacao)| {
            (
                id.to_string(),
                Position {
                    id,
                    nome: Some(nome.to_string()),
                    abreviacao: Some(abreviacao.to_string()),
                },
            )
        })
        .collect();

        let status = [
            (2, "Dúvida"),
            (3, "Suspenso"),
            (5, "Contundido"),
            (6, "Nulo"),
            (7, "Provável"),
        ]
        .into_iter()
        .map(|(id, nome)| {
            (
                id.to_string(),
                AthleteStatus {
                    id,
                    nome: Some(nome.to_string()),
                },
            )
        })
        .collect();

        MarketResponse {
            atletas,
            clubes,
            posicoes,
            status,
        }
    }

    pub fn market_payload(athletes: usize, clubs: usize) -> Value {
        serde_json::to_value(Self::market(athletes, clubs)).unwrap_or_default()
    }

    /// `count` matches for `period`, ids unique across periods
    pub fn matches(period: PeriodId, count: usize) -> Vec<Match> {
        (0..count as i64)
            .map(|i| Match {
                partida_id: period * 1000 + i,
                clube_casa_id: Some(260 + 2 * i),
                clube_visitante_id: Some(261 + 2 * i),
                placar_oficial_mandante: Some(1),
                placar_oficial_visitante: Some(0),
                local: Some("Maracanã".to_string()),
                partida_data: Some("2025-05-10 16:00:00".to_string()),
                valida: Some(true),
                timestamp: Some(1_746_903_600 + i),
            })
            .collect()
    }

    pub fn matches_payload(period: PeriodId, count: usize) -> Value {
        json!({
            "partidas": serde_json::to_value(Self::matches(period, count)).unwrap_or_default(),
            "rodada": period
        })
    }

    pub fn scored_athlete(points: f64) -> ScoredAthlete {
        ScoredAthlete {
            clube_id: Some(262),
            posicao_id: Some(5),
            pontuacao: Some(points),
            entrou_em_campo: Some(true),
            apelido: Some("Pontuado".to_string()),
            foto: None,
            scout: Some(Scout {
                g: 1,
                fs: 2,
                ..Scout::default()
            }),
        }
    }

    /// `count` scored athletes keyed by id, as in `/atletas/pontuados/{period}`
    pub fn scored(count: usize) -> BTreeMap<String, ScoredAthlete> {
        (0..count)
            .map(|i| ((1000 + i).to_string(), Self::scored_athlete(i as f64)))
            .collect()
    }

    pub fn scored_payload(period: PeriodId, count: usize) -> Value {
        json!({
            "atletas": serde_json::to_value(Self::scored(count)).unwrap_or_default(),
            "rodada": period
        })
    }

    pub fn formations() -> Vec<Formation> {
        [
            (1, "3-4-3", 3, 3, 0, 4),
            (2, "3-5-2", 2, 3, 0, 5),
            (3, "4-3-3", 3, 2, 2, 3),
            (4, "4-4-2", 2, 2, 2, 4),
            (5, "4-5-1", 1, 2, 2, 5),
            (6, "5-3-2", 2, 3, 2, 3),
            (7, "5-4-1", 1, 3, 2, 4),
        ]
        .into_iter()
        .map(|(esquema_id, nome, ata, zag, lat, mei)| Formation {
            esquema_id,
            nome: Some(nome.to_string()),
            posicoes: FormationSlots {
                ata,
                gol: 1,
                lat,
                mei,
                tec: 1,
                zag,
            },
        })
        .collect()
    }

    pub fn formations_payload() -> Value {
        serde_json::to_value(Self::formations()).unwrap_or_default()
    }

    pub fn highlights(count: usize) -> Vec<Highlight> {
        (0..count as i64)
            .map(|i| Highlight {
                atleta: HighlightAthlete {
                    atleta_id: 1000 + i,
                    apelido: Some(format!("Destaque {i}")),
                    preco_editorial: Some(10.0 + i as f64),
                },
                posicao: Some("Atacante".to_string()),
                posicao_abreviacao: Some("ata".to_string()),
                clube_id: Some(262),
                clube: Some("FLA".to_string()),
                escalacoes: Some(100_000 - i),
            })
            .collect()
    }

    pub fn highlights_payload(count: usize) -> Value {
        serde_json::to_value(Self::highlights(count)).unwrap_or_default()
    }
}

/// In-process `CartolaApi` that records what was asked and injects failures.
pub struct FakeCartolaApi {
    current_period: Option<PeriodId>,
    season: Option<i32>,
    fail_status: bool,
    empty_periods: BTreeSet<PeriodId>,
    rejected_tokens: HashSet<String>,
    market_athletes: usize,
    market_clubs: usize,
    status_calls: AtomicU32,
    market_calls: AtomicU32,
    formations_calls: AtomicU32,
    requested_matches: Mutex<Vec<PeriodId>>,
    requested_scored: Mutex<Vec<PeriodId>>,
    highlight_tokens: Mutex<Vec<String>>,
}

impl FakeCartolaApi {
    pub fn new(current_period: PeriodId) -> Self {
        Self {
            current_period: Some(current_period),
            season: Some(2025),
            fail_status: false,
            empty_periods: BTreeSet::new(),
            rejected_tokens: HashSet::new(),
            market_athletes: 30,
            market_clubs: 20,
            status_calls: AtomicU32::new(0),
            market_calls: AtomicU32::new(0),
            formations_calls: AtomicU32::new(0),
            requested_matches: Mutex::new(Vec::new()),
            requested_scored: Mutex::new(Vec::new()),
            highlight_tokens: Mutex::new(Vec::new()),
        }
    }

    /// Every status call times out
    pub fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    /// Status payload without a current period
    pub fn without_period(mut self) -> Self {
        self.current_period = None;
        self
    }

    /// Matches and scored athletes for `period` come back empty
    pub fn with_empty_period(mut self, period: PeriodId) -> Self {
        self.empty_periods.insert(period);
        self
    }

    /// Market snapshot size, e.g. `(0, 20)` for a closed market
    pub fn with_market(mut self, athletes: usize, clubs: usize) -> Self {
        self.market_athletes = athletes;
        self.market_clubs = clubs;
        self
    }

    /// Highlights answer 401 for this bearer token
    pub fn rejecting_token(mut self, token: impl Into<String>) -> Self {
        self.rejected_tokens.insert(token.into());
        self
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn market_calls(&self) -> u32 {
        self.market_calls.load(Ordering::SeqCst)
    }

    pub fn formations_calls(&self) -> u32 {
        self.formations_calls.load(Ordering::SeqCst)
    }

    /// Periods requested from the matches endpoint, sorted
    pub fn requested_matches(&self) -> Vec<PeriodId> {
        sorted(&self.requested_matches)
    }

    pub fn requested_scored(&self) -> Vec<PeriodId> {
        sorted(&self.requested_scored)
    }

    pub fn highlight_tokens(&self) -> Vec<String> {
        self.highlight_tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn sorted(periods: &Mutex<Vec<PeriodId>>) -> Vec<PeriodId> {
    let mut periods = periods.lock().unwrap_or_else(|e| e.into_inner()).clone();
    periods.sort_unstable();
    periods
}

fn record<T>(log: &Mutex<Vec<T>>, value: T) {
    log.lock().unwrap_or_else(|e| e.into_inner()).push(value);
}

#[async_trait]
impl CartolaApi for FakeCartolaApi {
    async fn fetch_status(&self) -> Result<MarketStatus, AppError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status {
            return Err(AppError::network_timeout("fake://mercado/status"));
        }
        Ok(MarketStatus {
            rodada_atual: self.current_period,
            temporada: self.season,
            ..MarketStatus::default()
        })
    }

    async fn fetch_market(&self) -> Result<MarketResponse, AppError> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TestDataBuilder::market(
            self.market_athletes,
            self.market_clubs,
        ))
    }

    async fn fetch_scored(&self, period: PeriodId) -> Result<ScoredResponse, AppError> {
        record(&self.requested_scored, period);
        if self.empty_periods.contains(&period) {
            return Err(AppError::api_no_data(
                format!("No scored athletes for period {period}"),
                format!("fake://atletas/pontuados/{period}"),
            ));
        }
        Ok(ScoredResponse {
            atletas: TestDataBuilder::scored(5),
            rodada: Some(period),
        })
    }

    async fn fetch_matches(&self, period: PeriodId) -> Result<MatchesResponse, AppError> {
        record(&self.requested_matches, period);
        if self.empty_periods.contains(&period) {
            return Err(AppError::api_no_data(
                format!("No matches for period {period}"),
                format!("fake://partidas/{period}"),
            ));
        }
        Ok(MatchesResponse {
            partidas: TestDataBuilder::matches(period, 10),
            rodada: Some(period),
        })
    }

    async fn fetch_formations(&self) -> Result<Vec<Formation>, AppError> {
        self.formations_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TestDataBuilder::formations())
    }

    async fn fetch_highlights(&self, access_token: &str) -> Result<Vec<Highlight>, AppError> {
        record(&self.highlight_tokens, access_token.to_string());
        if self.rejected_tokens.contains(access_token) {
            return Err(AppError::auth_expired("fake://auth/mercado/destaques"));
        }
        Ok(TestDataBuilder::highlights(5))
    }
}

/// `CredentialStore` backed by a map
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn seed(&self, credential: Credential) {
        self.credentials
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(credential.env_key.clone(), credential);
    }

    pub fn snapshot(&self, env_key: &str) -> Option<Credential> {
        self.credentials
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(env_key)
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, env_key: &str) -> Result<Option<Credential>, CredentialError> {
        Ok(self.snapshot(env_key))
    }

    async fn put(&self, env_key: &str, tokens: &TokenTriple) -> Result<(), CredentialError> {
        let mut credentials = self.credentials.lock().unwrap_or_else(|e| e.into_inner());
        let credential = credentials
            .get_mut(env_key)
            .ok_or_else(|| CredentialError::NotFound(env_key.to_string()))?;
        credential.tokens = tokens.clone();
        credential.last_refreshed_at = Some(Utc::now());
        Ok(())
    }

    async fn insert_if_absent(&self, credential: &Credential) -> Result<bool, CredentialError> {
        let mut credentials = self.credentials.lock().unwrap_or_else(|e| e.into_inner());
        if credentials.contains_key(&credential.env_key) {
            return Ok(false);
        }
        credentials.insert(credential.env_key.clone(), credential.clone());
        Ok(true)
    }
}

/// `TokenRefresher` that hands out `access-N` / `refresh-N` on the N-th call
pub struct FakeRefresher {
    succeed: bool,
    delay: Duration,
    calls: AtomicU32,
}

impl FakeRefresher {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::succeeding()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh(&self, _current: &TokenTriple) -> Result<RefreshedTokens, CredentialError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if !self.succeed {
            return Err(CredentialError::RefreshFailed(format!(
                "refresh endpoint returned 401 (call {n})"
            )));
        }
        Ok(RefreshedTokens {
            access_token: format!("access-{n}"),
            refresh_token: Some(format!("refresh-{n}")),
            id_token: None,
        })
    }
}
