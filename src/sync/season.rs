//! Process-wide season (`temporada`) cache with a TTL.
//!
//! Lazily populated from the status payload, refreshed once the TTL elapses and
//! falling back to the last known value, or the calendar year, when the status
//! endpoint keeps failing.

use chrono::{Datelike, Utc};
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::api::models::MarketStatus;
use crate::constants::cache_ttl;
use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
struct CachedSeason {
    season: i32,
    cached_at: Instant,
}

impl CachedSeason {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= Duration::from_secs(cache_ttl::SEASON_SECONDS)
    }
}

static SEASON_CACHE: LazyLock<RwLock<Option<CachedSeason>>> =
    LazyLock::new(|| RwLock::new(None));

/// Calendar year, used when no season was ever observed.
pub fn default_season() -> i32 {
    Utc::now().year()
}

pub async fn record_season(season: i32) {
    let mut cache = SEASON_CACHE.write().await;
    if cache.map(|c| c.season) != Some(season) {
        info!("Season set to {season}");
    }
    *cache = Some(CachedSeason {
        season,
        cached_at: Instant::now(),
    });
}

/// Cached season if it is still within its TTL.
pub async fn cached_season() -> Option<i32> {
    let cache = SEASON_CACHE.read().await;
    cache.filter(|c| !c.is_expired()).map(|c| c.season)
}

pub async fn invalidate_season_cache() {
    let mut cache = SEASON_CACHE.write().await;
    if cache.take().is_some() {
        debug!("Season cache invalidated");
    }
}

/// Current season.
///
/// A fresh cache entry wins without awaiting `fetch_status`. Otherwise the
/// status payload's `temporada` is recorded and returned; if the fetch fails
/// or carries no season, a stale entry is reused, then the calendar year.
#[instrument(skip(fetch_status))]
pub async fn resolve_season<F>(fetch_status: F) -> i32
where
    F: Future<Output = Result<MarketStatus, AppError>>,
{
    if let Some(season) = cached_season().await {
        debug!("Season cache hit: {season}");
        return season;
    }

    match fetch_status.await {
        Ok(MarketStatus {
            temporada: Some(season),
            ..
        }) => {
            record_season(season).await;
            return season;
        }
        Ok(_) => warn!("Status payload carried no season"),
        Err(e) => warn!("Could not fetch status for season: {e}"),
    }

    let stale = SEASON_CACHE.read().await.map(|c| c.season);
    match stale {
        Some(season) => {
            debug!("Using stale season {season}");
            season
        }
        None => {
            let fallback = default_season();
            warn!("No season known, falling back to {fallback}");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status(season: Option<i32>) -> MarketStatus {
        MarketStatus {
            rodada_atual: Some(5),
            temporada: season,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_fresh_cache_skips_fetch() {
        invalidate_season_cache().await;
        record_season(2025).await;

        let calls = AtomicU32::new(0);
        let season = resolve_season(async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(status(Some(2030)))
        })
        .await;

        assert_eq!(season, 2025);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        invalidate_season_cache().await;
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_expired_cache_is_refreshed() {
        invalidate_season_cache().await;
        record_season(2025).await;
        tokio::time::advance(Duration::from_secs(cache_ttl::SEASON_SECONDS + 1)).await;

        assert_eq!(cached_season().await, None);
        let season = resolve_season(async { Ok(status(Some(2026))) }).await;

        assert_eq!(season, 2026);
        assert_eq!(cached_season().await, Some(2026));
        invalidate_season_cache().await;
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_failed_fetch_uses_stale_value() {
        invalidate_season_cache().await;
        record_season(2024).await;
        tokio::time::advance(Duration::from_secs(cache_ttl::SEASON_SECONDS + 1)).await;

        let season =
            resolve_season(async { Err(AppError::network_timeout("http://test/status")) }).await;

        assert_eq!(season, 2024);
        invalidate_season_cache().await;
    }

    #[tokio::test]
    #[serial]
    async fn test_no_season_anywhere_falls_back_to_calendar_year() {
        invalidate_season_cache().await;
        let season = resolve_season(async { Ok(status(None)) }).await;
        assert_eq!(season, default_season());
        assert_eq!(cached_season().await, None);
    }
}
