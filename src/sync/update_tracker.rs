//! Per-table bookkeeping that keeps repeated cycles idempotent.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::api::models::PeriodId;
use crate::constants::freshness::HIGHLIGHTS_WINDOW_HOURS;
use crate::error::AppError;
use crate::storage::{SyncStore, Table};

#[derive(Clone)]
pub struct UpdateTracker {
    store: Arc<dyn SyncStore>,
}

impl UpdateTracker {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    pub async fn has_data(&self, table: Table) -> Result<bool, AppError> {
        Ok(self.store.row_count(table).await? > 0)
    }

    /// Whether `table` has already been processed for `period`.
    ///
    /// Period-scoped tables check for rows of that exact period. Other tables
    /// fall back to a 24 hour window on the last update, which only
    /// approximates "this period" around round boundaries.
    pub async fn was_updated_this_period(
        &self,
        table: Table,
        period: PeriodId,
    ) -> Result<bool, AppError> {
        self.was_updated_this_period_at(table, period, Utc::now())
            .await
    }

    pub async fn was_updated_this_period_at(
        &self,
        table: Table,
        period: PeriodId,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        if table.is_period_scoped() {
            return self.store.has_period(table, period).await;
        }
        let Some(last) = self.store.last_update(table).await? else {
            return Ok(false);
        };
        Ok(now.signed_duration_since(last) < Duration::hours(HIGHLIGHTS_WINDOW_HOURS))
    }

    /// Stamps `table` with the current time, whether or not anything was fetched.
    pub async fn mark_updated(&self, table: Table) -> Result<(), AppError> {
        self.store.mark_updated(table, Utc::now()).await
    }

    pub async fn last_update(&self, table: Table) -> Result<Option<DateTime<Utc>>, AppError> {
        self.store.last_update(table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteSyncStore, init_memory_pool};
    use crate::testing_utils::TestDataBuilder;

    async fn tracker() -> (UpdateTracker, Arc<SqliteSyncStore>) {
        let store = Arc::new(SqliteSyncStore::new(init_memory_pool().await.unwrap()));
        (UpdateTracker::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_has_data_follows_row_count() {
        let (tracker, store) = tracker().await;
        assert!(!tracker.has_data(Table::Matches).await.unwrap());

        store
            .store_matches(3, &TestDataBuilder::matches(3, 1))
            .await
            .unwrap();
        assert!(tracker.has_data(Table::Matches).await.unwrap());
    }

    #[tokio::test]
    async fn test_period_tables_check_exact_period() {
        let (tracker, store) = tracker().await;
        store
            .store_matches(3, &TestDataBuilder::matches(3, 2))
            .await
            .unwrap();

        assert!(tracker.was_updated_this_period(Table::Matches, 3).await.unwrap());
        assert!(!tracker.was_updated_this_period(Table::Matches, 4).await.unwrap());
    }

    #[tokio::test]
    async fn test_highlights_use_24h_window() {
        let (tracker, _store) = tracker().await;
        assert!(
            !tracker
                .was_updated_this_period(Table::Highlights, 10)
                .await
                .unwrap()
        );

        tracker.mark_updated(Table::Highlights).await.unwrap();
        let now = Utc::now();

        assert!(
            tracker
                .was_updated_this_period_at(Table::Highlights, 10, now + Duration::hours(23))
                .await
                .unwrap()
        );
        assert!(
            !tracker
                .was_updated_this_period_at(Table::Highlights, 10, now + Duration::hours(25))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_mark_updated_never_goes_backwards() {
        let (tracker, store) = tracker().await;
        let future = Utc::now() + Duration::days(1);
        store.mark_updated(Table::Clubs, future).await.unwrap();

        tracker.mark_updated(Table::Clubs).await.unwrap();

        let last = tracker.last_update(Table::Clubs).await.unwrap().unwrap();
        assert_eq!(last.timestamp_millis(), future.timestamp_millis());
    }
}
