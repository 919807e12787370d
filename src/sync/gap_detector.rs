//! Missing-period detection for period-scoped tables.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::api::models::PeriodId;
use crate::error::AppError;
use crate::storage::{SyncStore, Table};

/// Periods in `[1, current - 1]` (or the last `lookback` of them) that are not
/// in `existing`, newest first.
pub fn compute_missing(
    existing: &BTreeSet<PeriodId>,
    current: PeriodId,
    lookback: Option<u32>,
) -> Vec<PeriodId> {
    if current <= 1 {
        return Vec::new();
    }
    let upper = current - 1;
    let lower = match lookback {
        Some(n) => (upper - i64::from(n) + 1).max(1),
        None => 1,
    };
    (lower..=upper)
        .rev()
        .filter(|p| !existing.contains(p))
        .collect()
}

#[derive(Clone)]
pub struct GapDetector {
    store: Arc<dyn SyncStore>,
}

impl GapDetector {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Completed periods that `table` has no rows for, newest first.
    pub async fn missing_periods(
        &self,
        table: Table,
        current: PeriodId,
        max_lookback: Option<u32>,
    ) -> Result<Vec<PeriodId>, AppError> {
        if current <= 1 || max_lookback == Some(0) {
            return Ok(Vec::new());
        }
        let existing = self.store.existing_periods(table, 1, current - 1).await?;
        Ok(compute_missing(&existing, current, max_lookback))
    }
}
