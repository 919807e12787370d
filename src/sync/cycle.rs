//! One full synchronization pass.
//!
//! Stages run strictly in order and fail soft: a failed stage is recorded and
//! the next one still runs. Only an unresolvable current period aborts the
//! whole cycle.
//!
//! 1. status: resolve the current period and season
//! 2. market: athlete snapshot, stored every cycle
//! 3. clubs, positions, statuses, formations: fetched only while their table is empty
//! 4. matches, scored: backfill of missing completed periods
//! 5. highlights: once per period, needs a bearer token

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::gap_detector::GapDetector;
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use super::season;
use super::status::{CycleOutcome, CycleReport, Stage, StageResult};
use super::update_tracker::UpdateTracker;
use crate::api::CartolaApi;
use crate::api::models::{AthleteStatus, Club, Highlight, MarketResponse, PeriodId, Position};
use crate::config::Config;
use crate::constants::retry::{AUXILIARY_BASE_DELAY_MS, AUXILIARY_MAX_ATTEMPTS};
use crate::credentials::CredentialManager;
use crate::error::AppError;
use crate::storage::{SyncStore, Table};

/// Knobs of a cycle that are not part of the rate or retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSettings {
    pub env_key: String,
    pub backfill_lookback: Option<u32>,
    pub backfill_concurrency: usize,
    pub match_rescan_periods: u32,
}

impl CycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            env_key: config.env_key.clone(),
            backfill_lookback: config.backfill_lookback,
            backfill_concurrency: config.backfill_concurrency.max(1),
            match_rescan_periods: config.match_rescan_periods,
        }
    }
}

type StageOutcome = Result<Option<String>, AppError>;

const PIPELINE: [Stage; 8] = [
    Stage::Market,
    Stage::Clubs,
    Stage::Positions,
    Stage::Statuses,
    Stage::Formations,
    Stage::Matches,
    Stage::Scored,
    Stage::Highlights,
];

pub struct FetchCycle {
    api: Arc<dyn CartolaApi>,
    store: Arc<dyn SyncStore>,
    credentials: Arc<CredentialManager>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    auxiliary_retry: RetryPolicy,
    tracker: UpdateTracker,
    gaps: GapDetector,
    settings: CycleSettings,
}

struct RunState {
    started_at: chrono::DateTime<Utc>,
    current_period: Option<PeriodId>,
    season: Option<i32>,
    stages: Vec<StageResult>,
}

impl RunState {
    fn push(&mut self, stage: Stage, started: Instant, outcome: StageOutcome) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = match outcome {
            Ok(detail) => StageResult {
                stage,
                ok: true,
                elapsed_ms,
                detail,
            },
            Err(e) => {
                if e.is_no_data() {
                    warn!("Stage {stage}: no data available: {e}");
                } else {
                    error!("Stage {stage} failed: {e}");
                }
                StageResult {
                    stage,
                    ok: false,
                    elapsed_ms,
                    detail: Some(e.to_string()),
                }
            }
        };
        self.stages.push(result);
    }

    fn finish(self, outcome: CycleOutcome, cancelled: bool, error: Option<String>) -> CycleReport {
        CycleReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            current_period: self.current_period,
            season: self.season,
            outcome,
            stages: self.stages,
            cancelled,
            error,
        }
    }
}

impl FetchCycle {
    pub fn new(
        api: Arc<dyn CartolaApi>,
        store: Arc<dyn SyncStore>,
        credentials: Arc<CredentialManager>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        settings: CycleSettings,
    ) -> Self {
        let auxiliary_retry = retry
            .clone()
            .with_max_attempts(AUXILIARY_MAX_ATTEMPTS)
            .with_base_delay(Duration::from_millis(AUXILIARY_BASE_DELAY_MS));
        Self {
            tracker: UpdateTracker::new(Arc::clone(&store)),
            gaps: GapDetector::new(Arc::clone(&store)),
            api,
            store,
            credentials,
            limiter,
            retry,
            auxiliary_retry,
            settings,
        }
    }

    pub fn tracker(&self) -> &UpdateTracker {
        &self.tracker
    }

    pub fn gaps(&self) -> &GapDetector {
        &self.gaps
    }

    /// Runs every stage once. Cancellation is honoured between stages only.
    #[instrument(skip_all, name = "fetch_cycle")]
    pub async fn run(&self, cancel: &CancellationToken) -> CycleReport {
        let mut state = RunState {
            started_at: Utc::now(),
            current_period: None,
            season: None,
            stages: Vec::new(),
        };
        info!("Starting fetch cycle");

        let started = Instant::now();
        let status = match self
            .call("status", &self.retry, || self.api.fetch_status())
            .await
        {
            Ok(status) => status,
            Err(e) => {
                let e = AppError::fatal_precondition(format!("status unavailable: {e}"));
                return self.abort(state, started, e);
            }
        };
        let period = match status.current_period() {
            Some(period) if period >= 1 => period,
            other => {
                let shown = other.map_or_else(|| "missing".to_string(), |p| p.to_string());
                let e = AppError::fatal_precondition(format!("current period is {shown}"));
                return self.abort(state, started, e);
            }
        };
        state.current_period = Some(period);
        state.season = Some(season::resolve_season(std::future::ready(Ok(status))).await);
        state.push(Stage::Status, started, Ok(Some(format!("period {period}"))));

        let mut market: Option<MarketResponse> = None;
        for stage in PIPELINE {
            if cancel.is_cancelled() {
                return self.cancelled(state);
            }
            let started = Instant::now();
            let outcome = self.run_stage(stage, period, &mut market).await;
            state.push(stage, started, outcome);
        }

        let outcome = if state.stages.iter().all(|s| s.ok) {
            CycleOutcome::Success
        } else {
            CycleOutcome::Partial
        };
        let report = state.finish(outcome, false, None);
        log_summary(&report);
        report
    }

    async fn run_stage(
        &self,
        stage: Stage,
        period: PeriodId,
        market: &mut Option<MarketResponse>,
    ) -> StageOutcome {
        match stage {
            Stage::Status => Ok(None),
            Stage::Market => self.refresh_market(period, market).await,
            Stage::Clubs => {
                self.once_only(Table::Clubs, move || async move {
                    let snapshot = self.market_snapshot(market).await?;
                    let rows: Vec<Club> = snapshot.clubes.values().cloned().collect();
                    self.store.store_clubs(&rows).await?;
                    Ok(rows.len())
                })
                .await
            }
            Stage::Positions => {
                self.once_only(Table::Positions, move || async move {
                    let snapshot = self.market_snapshot(market).await?;
                    let rows: Vec<Position> = snapshot.posicoes.values().cloned().collect();
                    self.store.store_positions(&rows).await?;
                    Ok(rows.len())
                })
                .await
            }
            Stage::Statuses => {
                self.once_only(Table::Statuses, move || async move {
                    let snapshot = self.market_snapshot(market).await?;
                    let rows: Vec<AthleteStatus> = snapshot.status.values().cloned().collect();
                    self.store.store_statuses(&rows).await?;
                    Ok(rows.len())
                })
                .await
            }
            Stage::Formations => {
                self.once_only(Table::Formations, move || async move {
                    let formations = self
                        .call("formations", &self.auxiliary_retry, || {
                            self.api.fetch_formations()
                        })
                        .await?;
                    self.store.store_formations(&formations).await?;
                    Ok(formations.len())
                })
                .await
            }
            Stage::Matches => self.backfill(Table::Matches, period).await,
            Stage::Scored => self.backfill(Table::Scored, period).await,
            Stage::Highlights => self.current_period_highlights(period).await,
        }
    }

    fn abort(&self, mut state: RunState, started: Instant, e: AppError) -> CycleReport {
        let message = e.to_string();
        state.push(Stage::Status, started, Err(e));
        error!("Aborting cycle: {message}");
        let report = state.finish(CycleOutcome::Error, false, Some(message));
        log_summary(&report);
        report
    }

    fn cancelled(&self, state: RunState) -> CycleReport {
        info!("Cycle cancelled between stages");
        let report = state.finish(CycleOutcome::Partial, true, None);
        log_summary(&report);
        report
    }

    /// One outbound call: every attempt takes a rate-limit slot first.
    async fn call<T, F, Fut>(&self, label: &str, retry: &RetryPolicy, op: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let limiter = &self.limiter;
        let op = &op;
        retry
            .execute(label, move || async move {
                limiter.acquire().await;
                op().await
            })
            .await
    }

    async fn refresh_market(
        &self,
        period: PeriodId,
        slot: &mut Option<MarketResponse>,
    ) -> StageOutcome {
        let snapshot = self.market_snapshot(slot).await?;
        // A closed market still lists clubs; its empty athlete list must not
        // replace the stored snapshot.
        if snapshot.atletas.is_empty() {
            return Err(AppError::api_no_data(
                "Market snapshot has no athletes",
                "atletas/mercado",
            ));
        }
        self.store.store_athletes(period, &snapshot.atletas).await?;
        self.tracker.mark_updated(Table::Athletes).await?;
        Ok(Some(format!("{} athletes", snapshot.atletas.len())))
    }

    /// Fetched market snapshot, reused by the taxonomy stages.
    async fn market_snapshot<'a>(
        &self,
        slot: &'a mut Option<MarketResponse>,
    ) -> Result<&'a MarketResponse, AppError> {
        let market = match slot.take() {
            Some(market) => market,
            None => {
                self.call("market", &self.retry, || self.api.fetch_market())
                    .await?
            }
        };
        Ok(&*slot.insert(market))
    }

    /// Reference data: fetched only while the table is empty, stamped either way.
    async fn once_only<F, Fut>(&self, table: Table, fetch_and_store: F) -> StageOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<usize, AppError>>,
    {
        let detail = if self.tracker.has_data(table).await? {
            debug!("{table} already populated, skipping fetch");
            Some("already present".to_string())
        } else {
            let stored = fetch_and_store().await?;
            Some(format!("{stored} rows"))
        };
        self.tracker.mark_updated(table).await?;
        Ok(detail)
    }

    /// Completed periods that are stored but re-fetched anyway so evolving
    /// scores get updated in place.
    fn rescan_periods(
        &self,
        table: Table,
        current: PeriodId,
        missing: &[PeriodId],
    ) -> Vec<PeriodId> {
        let n = i64::from(self.settings.match_rescan_periods);
        if table != Table::Matches || n == 0 || current <= 1 {
            return Vec::new();
        }
        let missing: BTreeSet<PeriodId> = missing.iter().copied().collect();
        ((current - n).max(1)..current)
            .rev()
            .filter(|p| !missing.contains(p))
            .collect()
    }

    async fn backfill(&self, table: Table, current: PeriodId) -> StageOutcome {
        let missing = self
            .gaps
            .missing_periods(table, current, self.settings.backfill_lookback)
            .await?;
        let rescans = self.rescan_periods(table, current, &missing);

        if missing.is_empty() && rescans.is_empty() {
            debug!("{table}: history complete up to period {}", current - 1);
            self.tracker.mark_updated(table).await?;
            return Ok(Some("complete".to_string()));
        }

        if !missing.is_empty() {
            info!("{table}: backfilling {} missing periods: {missing:?}", missing.len());
        }
        let targets: Vec<PeriodId> = missing.iter().chain(rescans.iter()).copied().collect();

        let results: Vec<(PeriodId, Result<usize, AppError>)> = stream::iter(targets)
            .map(|period| async move { (period, self.backfill_period(table, period).await) })
            .buffer_unordered(self.settings.backfill_concurrency)
            .collect()
            .await;

        let mut failed = 0;
        let mut stored_rows = 0;
        for (period, result) in &results {
            match result {
                Ok(rows) => stored_rows += rows,
                Err(e) => {
                    failed += 1;
                    if e.is_no_data() {
                        warn!("{table}: no data for period {period}");
                    } else {
                        error!("{table}: period {period} failed: {e}");
                    }
                }
            }
        }

        if failed > 0 {
            return Err(AppError::BackfillIncomplete {
                table: table.name().to_string(),
                failed,
                total: results.len(),
            });
        }

        self.tracker.mark_updated(table).await?;
        Ok(Some(format!(
            "{} periods fetched, {} rescanned, {stored_rows} rows",
            missing.len(),
            rescans.len()
        )))
    }

    async fn backfill_period(&self, table: Table, period: PeriodId) -> Result<usize, AppError> {
        match table {
            Table::Matches => {
                let response = self
                    .call(&format!("matches {period}"), &self.retry, || {
                        self.api.fetch_matches(period)
                    })
                    .await?;
                self.store.store_matches(period, &response.partidas).await?;
                Ok(response.partidas.len())
            }
            Table::Scored => {
                let response = self
                    .call(&format!("scored {period}"), &self.retry, || {
                        self.api.fetch_scored(period)
                    })
                    .await?;
                self.store.store_scored(period, &response.atletas).await?;
                Ok(response.atletas.len())
            }
            other => Err(AppError::NotPeriodScoped {
                table: other.name().to_string(),
            }),
        }
    }

    async fn current_period_highlights(&self, period: PeriodId) -> StageOutcome {
        if self
            .tracker
            .was_updated_this_period(Table::Highlights, period)
            .await?
        {
            debug!("Highlights already updated for period {period}");
            return Ok(Some("already updated".to_string()));
        }

        let highlights = self.fetch_highlights().await?;
        self.store.store_highlights(&highlights).await?;
        self.tracker.mark_updated(Table::Highlights).await?;
        Ok(Some(format!("{} rows", highlights.len())))
    }

    /// Authenticated fetch with one re-authentication after a 401.
    async fn fetch_highlights(&self) -> Result<Vec<Highlight>, AppError> {
        let env_key = self.settings.env_key.as_str();
        let token = self.credentials.get_token(env_key).await?;

        match self
            .call("highlights", &self.auxiliary_retry, || {
                self.api.fetch_highlights(&token)
            })
            .await
        {
            Err(e) if e.is_auth_expired() => {
                warn!("Access token for {env_key} rejected, refreshing once");
                self.credentials.invalidate_token(env_key, &token).await;
                let fresh = self.credentials.get_token(env_key).await?;
                self.call("highlights", &self.auxiliary_retry, || {
                    self.api.fetch_highlights(&fresh)
                })
                .await
            }
            other => other,
        }
    }
}

fn log_summary(report: &CycleReport) {
    let elapsed = report.finished_at - report.started_at;
    info!(
        "Cycle {} in {:.1}s (period {}, season {})",
        report.outcome,
        elapsed.num_milliseconds() as f64 / 1000.0,
        report
            .current_period
            .map_or_else(|| "?".to_string(), |p| p.to_string()),
        report
            .season
            .map_or_else(|| "?".to_string(), |s| s.to_string()),
    );
    for stage in &report.stages {
        info!(
            "  {:<10} {:<6} {:>6} ms {}",
            stage.stage.to_string(),
            if stage.ok { "OK" } else { "FAILED" },
            stage.elapsed_ms,
            stage.detail.as_deref().unwrap_or("")
        );
    }
}
