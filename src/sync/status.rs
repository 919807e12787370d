//! Cycle results and the observable service status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::api::models::PeriodId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleOutcome {
    /// Every stage succeeded.
    Success,
    /// The cycle ran but at least one stage failed, or it was cancelled.
    Partial,
    /// The current period could not be resolved, or the cycle itself crashed.
    Error,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleOutcome::Success => "success",
            CycleOutcome::Partial => "partial",
            CycleOutcome::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Status,
    Market,
    Clubs,
    Positions,
    Statuses,
    Formations,
    Matches,
    Scored,
    Highlights,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Status => "status",
            Stage::Market => "market",
            Stage::Clubs => "clubs",
            Stage::Positions => "positions",
            Stage::Statuses => "statuses",
            Stage::Formations => "formations",
            Stage::Matches => "matches",
            Stage::Scored => "scored",
            Stage::Highlights => "highlights",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    pub ok: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub current_period: Option<PeriodId>,
    pub season: Option<i32>,
    pub outcome: CycleOutcome,
    pub stages: Vec<StageResult>,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Report for a cycle that died before producing any stage result.
    pub fn crashed(started_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            current_period: None,
            season: None,
            outcome: CycleOutcome::Error,
            stages: Vec::new(),
            cancelled: false,
            error: Some(message.into()),
        }
    }
}

/// What `--status-json` prints and the scheduler keeps current.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub last_cycle_time: Option<DateTime<Utc>>,
    pub last_cycle_outcome: Option<CycleOutcome>,
    pub current_period: Option<PeriodId>,
    pub season: Option<i32>,
    pub stage_results: Vec<StageResult>,
}

impl ServiceStatus {
    pub fn record(&mut self, report: &CycleReport) {
        self.last_cycle_time = Some(report.finished_at);
        self.last_cycle_outcome = Some(report.outcome);
        if report.current_period.is_some() {
            self.current_period = report.current_period;
        }
        if report.season.is_some() {
            self.season = report.season;
        }
        self.stage_results = report.stages.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase_outcome() {
        let mut status = ServiceStatus {
            running: true,
            ..Default::default()
        };
        let report = CycleReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            current_period: Some(12),
            season: Some(2025),
            outcome: CycleOutcome::Partial,
            stages: vec![StageResult {
                stage: Stage::Highlights,
                ok: false,
                elapsed_ms: 40,
                detail: Some("auth".to_string()),
            }],
            cancelled: false,
            error: None,
        };
        status.record(&report);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["last_cycle_outcome"], "partial");
        assert_eq!(json["current_period"], 12);
        assert_eq!(json["stage_results"][0]["stage"], "highlights");
        assert_eq!(json["stage_results"][0]["ok"], false);
    }

    #[test]
    fn test_crashed_report_keeps_previous_period() {
        let mut status = ServiceStatus {
            current_period: Some(7),
            ..Default::default()
        };
        status.record(&CycleReport::crashed(Utc::now(), "panic"));
        assert_eq!(status.current_period, Some(7));
        assert_eq!(status.last_cycle_outcome, Some(CycleOutcome::Error));
    }
}
