//! Application-wide constants and configuration defaults
//!
//! This module centralizes magic numbers and default values so that the
//! config layer, the HTTP layer and the sync engine agree on them.

/// Directory name used under the platform config and data directories
pub const APP_DIR_NAME: &str = "cartola_fetcher";

/// Default log file name inside the log directory
pub const LOG_FILE_NAME: &str = "cartola_fetcher.log";

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Maximum number of idle connections per host in the HTTP client pool
pub const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 16;

/// Remote API endpoints and the credential exchange
pub mod api {
    /// Base domain for the market, status, scored and matches endpoints
    pub const DEFAULT_API_DOMAIN: &str = "https://api.cartola.globo.com";

    /// Formation schemes are served from a separate host
    pub const DEFAULT_FORMATIONS_API_DOMAIN: &str = "https://api.cartolafc.globo.com";

    /// Token refresh exchange endpoint
    pub const DEFAULT_REFRESH_URL: &str = "https://web-api.globoid.globo.com/v1/refresh-token";

    /// Client id sent with every refresh exchange
    pub const DEFAULT_REFRESH_CLIENT_ID: &str = "cartola-web@apps.globoid";

    /// The refresh endpoint only accepts exchanges coming from the game's web origin
    pub const REFRESH_ORIGIN: &str = "https://cartola.globo.com";
    pub const REFRESH_REFERER: &str = "https://cartola.globo.com/";

    /// Default logical account for authenticated endpoints
    pub const DEFAULT_ENV_KEY: &str = "AERO_RBSV";
}

/// Outbound call budget
pub mod rate_limit {
    /// Maximum call starts inside one window
    pub const DEFAULT_MAX_CALLS: usize = 10;

    /// Length of the sliding window in milliseconds
    pub const DEFAULT_PERIOD_MS: u64 = 1000;
}

/// Retry policy defaults
pub mod retry {
    /// Total attempts, including the first one
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Delay before the second attempt (milliseconds)
    pub const DEFAULT_BASE_DELAY_MS: u64 = 2000;

    /// Growth factor applied to the delay after every failed attempt
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Upper bound for a single backoff sleep (milliseconds)
    pub const MAX_DELAY_MS: u64 = 120_000;

    /// Attempts for formations and highlights, which are cheap to miss for a cycle
    pub const AUXILIARY_MAX_ATTEMPTS: u32 = 2;

    /// Base delay for formations and highlights (milliseconds)
    pub const AUXILIARY_BASE_DELAY_MS: u64 = 3000;
}

/// Scheduler defaults
pub mod schedule {
    /// Minutes between two cycle starts
    pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

    /// Upper bound for the fetch interval (one week)
    pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
}

/// Freshness heuristics for entities without a period column
pub mod freshness {
    /// Highlights written within this window count as done for the current period
    pub const HIGHLIGHTS_WINDOW_HOURS: i64 = 24;
}

/// Cache TTL values in seconds
pub mod cache_ttl {
    /// How long an observed season stays valid before the next status read replaces it
    pub const SEASON_SECONDS: u64 = 6 * 3600;
}

/// Historical backfill tuning
pub mod backfill {
    /// Periods fetched concurrently during backfill
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Completed periods re-fetched every cycle to pick up late score changes (0 disables)
    pub const DEFAULT_MATCH_RESCAN_PERIODS: u32 = 0;
}

/// SQLite pool settings
pub mod database {
    /// File name of the default database inside the data directory
    pub const DATABASE_FILE_NAME: &str = "cartola.db";

    /// Pool size for the file-backed database
    pub const DEFAULT_POOL_SIZE: u32 = 5;

    /// Busy timeout in milliseconds
    pub const BUSY_TIMEOUT_MS: u64 = 30_000;

    /// Pool acquire timeout in seconds
    pub const ACQUIRE_TIMEOUT_SECONDS: u64 = 30;
}

/// Environment variable names
pub mod env_vars {
    pub const API_DOMAIN: &str = "CARTOLA_API_DOMAIN";
    pub const DATABASE_URL: &str = "CARTOLA_DATABASE_URL";
    pub const ENV_KEY: &str = "CARTOLA_ENV_KEY";
    pub const FETCH_INTERVAL_MINUTES: &str = "CARTOLA_FETCH_INTERVAL_MINUTES";
    /// Accepted for deployments that still export the unprefixed name
    pub const LEGACY_FETCH_INTERVAL_MINUTES: &str = "FETCH_INTERVAL_MINUTES";
    pub const MAX_RETRIES: &str = "CARTOLA_MAX_RETRIES";
    pub const BASE_RETRY_DELAY_MS: &str = "CARTOLA_BASE_RETRY_DELAY_MS";
    pub const RATE_LIMIT_MAX_CALLS: &str = "CARTOLA_RATE_LIMIT_MAX_CALLS";
    pub const RATE_LIMIT_PERIOD_MS: &str = "CARTOLA_RATE_LIMIT_PERIOD_MS";
    pub const HTTP_TIMEOUT: &str = "CARTOLA_HTTP_TIMEOUT";
    pub const LOG_FILE: &str = "CARTOLA_LOG_FILE";

    /// Bootstrap credential inputs
    pub const ACCESS_TOKEN: &str = "CARTOLA_ACCESS_TOKEN";
    pub const REFRESH_TOKEN: &str = "CARTOLA_REFRESH_TOKEN";
    pub const ID_TOKEN: &str = "CARTOLA_ID_TOKEN";
    pub const TOKEN_FILE: &str = "CARTOLA_TOKEN_FILE";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_defaults_are_reasonable() {
        assert_eq!(rate_limit::DEFAULT_MAX_CALLS, 10);
        assert_eq!(rate_limit::DEFAULT_PERIOD_MS, 1000);
    }

    #[test]
    fn test_retry_constants_are_reasonable() {
        let attempts = retry::DEFAULT_MAX_ATTEMPTS;
        let base = retry::DEFAULT_BASE_DELAY_MS;
        let multiplier = retry::DEFAULT_BACKOFF_MULTIPLIER;

        assert!(attempts >= 1);
        assert!(multiplier >= 1.0);
        // The last backoff before giving up must stay under the cap
        let worst = base as f64 * multiplier.powi(attempts as i32 - 1);
        assert!(worst <= retry::MAX_DELAY_MS as f64);
    }

    #[test]
    fn test_highlights_window_shorter_than_a_week() {
        assert!(freshness::HIGHLIGHTS_WINDOW_HOURS > 0);
        assert!(freshness::HIGHLIGHTS_WINDOW_HOURS < 24 * 7);
    }

    #[test]
    fn test_env_var_names_are_prefixed() {
        for name in [
            env_vars::API_DOMAIN,
            env_vars::DATABASE_URL,
            env_vars::ENV_KEY,
            env_vars::MAX_RETRIES,
            env_vars::HTTP_TIMEOUT,
            env_vars::LOG_FILE,
        ] {
            assert!(name.starts_with("CARTOLA_"), "{name} lacks prefix");
        }
    }
}
