use crate::constants::{self, env_vars};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub mod paths;
pub mod validation;

use paths::{get_config_path, get_default_database_url, get_log_dir_path};
use validation::validate_config;

/// Configuration structure for the fetcher.
/// Handles loading, saving, and managing runtime settings.
///
/// Every field has a serde default, so a partial file (or no file at all)
/// produces a usable configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Base URL for the market, status, scored and matches endpoints.
    #[serde(default = "default_api_domain")]
    pub api_domain: String,
    /// Base URL for the formation schemes endpoint.
    #[serde(default = "default_formations_api_domain")]
    pub formations_api_domain: String,
    /// Token refresh exchange endpoint.
    #[serde(default = "default_refresh_url")]
    pub refresh_url: String,
    /// Client id sent with the refresh exchange.
    #[serde(default = "default_refresh_client_id")]
    pub refresh_client_id: String,
    /// SQLite connection string.
    #[serde(default = "get_default_database_url")]
    pub database_url: String,
    /// Logical account used for authenticated endpoints.
    #[serde(default = "default_env_key")]
    pub env_key: String,
    /// Minutes between cycle starts.
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_minutes: u64,
    /// Total attempts per network call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the second attempt in milliseconds.
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_rate_limit_max_calls")]
    pub rate_limit_max_calls: usize,
    #[serde(default = "default_rate_limit_period_ms")]
    pub rate_limit_period_ms: u64,
    /// HTTP timeout in seconds for API requests. Defaults to 30 seconds if not specified.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    /// How many periods back gap detection looks. `None` searches the full history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill_lookback: Option<u32>,
    /// Missing periods fetched concurrently during backfill.
    #[serde(default = "default_backfill_concurrency")]
    pub backfill_concurrency: usize,
    /// Most recent completed periods whose matches are re-fetched every cycle.
    #[serde(default = "default_match_rescan_periods")]
    pub match_rescan_periods: u32,
    /// Path to the log file. If not specified, logs will be written to a default location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
}

fn default_api_domain() -> String {
    constants::api::DEFAULT_API_DOMAIN.to_string()
}

fn default_formations_api_domain() -> String {
    constants::api::DEFAULT_FORMATIONS_API_DOMAIN.to_string()
}

fn default_refresh_url() -> String {
    constants::api::DEFAULT_REFRESH_URL.to_string()
}

fn default_refresh_client_id() -> String {
    constants::api::DEFAULT_REFRESH_CLIENT_ID.to_string()
}

fn default_env_key() -> String {
    constants::api::DEFAULT_ENV_KEY.to_string()
}

fn default_fetch_interval() -> u64 {
    constants::schedule::DEFAULT_INTERVAL_MINUTES
}

fn default_max_retries() -> u32 {
    constants::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_base_retry_delay_ms() -> u64 {
    constants::retry::DEFAULT_BASE_DELAY_MS
}

fn default_backoff_multiplier() -> f64 {
    constants::retry::DEFAULT_BACKOFF_MULTIPLIER
}

fn default_rate_limit_max_calls() -> usize {
    constants::rate_limit::DEFAULT_MAX_CALLS
}

fn default_rate_limit_period_ms() -> u64 {
    constants::rate_limit::DEFAULT_PERIOD_MS
}

/// Default HTTP timeout in seconds
fn default_http_timeout() -> u64 {
    constants::DEFAULT_HTTP_TIMEOUT_SECONDS
}

fn default_backfill_concurrency() -> usize {
    constants::backfill::DEFAULT_CONCURRENCY
}

fn default_match_rescan_periods() -> u32 {
    constants::backfill::DEFAULT_MATCH_RESCAN_PERIODS
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_domain: default_api_domain(),
            formations_api_domain: default_formations_api_domain(),
            refresh_url: default_refresh_url(),
            refresh_client_id: default_refresh_client_id(),
            database_url: get_default_database_url(),
            env_key: default_env_key(),
            fetch_interval_minutes: default_fetch_interval(),
            max_retries: default_max_retries(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            rate_limit_max_calls: default_rate_limit_max_calls(),
            rate_limit_period_ms: default_rate_limit_period_ms(),
            http_timeout_seconds: default_http_timeout(),
            backfill_lookback: None,
            backfill_concurrency: default_backfill_concurrency(),
            match_rescan_periods: default_match_rescan_periods(),
            log_file_path: None,
        }
    }
}

/// Parses an environment variable, ignoring unset or unparsable values.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl Config {
    /// Loads configuration from the default config file location.
    /// A missing file yields the built-in defaults. Environment variables
    /// override file values.
    ///
    /// # Environment Variables
    /// - `CARTOLA_API_DOMAIN` - Override API domain
    /// - `CARTOLA_DATABASE_URL` - Override SQLite connection string
    /// - `CARTOLA_ENV_KEY` - Override the account used for authenticated calls
    /// - `CARTOLA_FETCH_INTERVAL_MINUTES` (or `FETCH_INTERVAL_MINUTES`) - Override cadence
    /// - `CARTOLA_MAX_RETRIES`, `CARTOLA_BASE_RETRY_DELAY_MS` - Override retry policy
    /// - `CARTOLA_RATE_LIMIT_MAX_CALLS`, `CARTOLA_RATE_LIMIT_PERIOD_MS` - Override call budget
    /// - `CARTOLA_HTTP_TIMEOUT` - Override HTTP timeout in seconds
    /// - `CARTOLA_LOG_FILE` - Override log file path
    pub async fn load() -> Result<Self, AppError> {
        let config_path = get_config_path();

        let mut config = if Path::new(&config_path).exists() {
            Self::load_from_path(&config_path).await?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Applies environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(api_domain) = std::env::var(env_vars::API_DOMAIN) {
            self.api_domain = api_domain;
        }

        if let Ok(database_url) = std::env::var(env_vars::DATABASE_URL) {
            self.database_url = database_url;
        }

        if let Ok(env_key) = std::env::var(env_vars::ENV_KEY) {
            self.env_key = env_key;
        }

        if let Some(minutes) = env_parse::<u64>(env_vars::FETCH_INTERVAL_MINUTES)
            .or_else(|| env_parse::<u64>(env_vars::LEGACY_FETCH_INTERVAL_MINUTES))
        {
            self.fetch_interval_minutes = minutes;
        }

        if let Some(retries) = env_parse::<u32>(env_vars::MAX_RETRIES) {
            self.max_retries = retries;
        }

        if let Some(delay) = env_parse::<u64>(env_vars::BASE_RETRY_DELAY_MS) {
            self.base_retry_delay_ms = delay;
        }

        if let Some(calls) = env_parse::<usize>(env_vars::RATE_LIMIT_MAX_CALLS) {
            self.rate_limit_max_calls = calls;
        }

        if let Some(period) = env_parse::<u64>(env_vars::RATE_LIMIT_PERIOD_MS) {
            self.rate_limit_period_ms = period;
        }

        if let Some(timeout) = env_parse::<u64>(env_vars::HTTP_TIMEOUT) {
            self.http_timeout_seconds = timeout;
        }

        if let Ok(log_file_path) = std::env::var(env_vars::LOG_FILE) {
            self.log_file_path = Some(log_file_path);
        }
    }

    /// Validates the configuration settings
    pub fn validate(&self) -> Result<(), AppError> {
        validate_config(self)
    }

    /// Saves current configuration to the default config file location.
    pub async fn save(&self) -> Result<(), AppError> {
        let config_path = get_config_path();
        self.save_to_path(&config_path).await
    }

    /// Returns the platform-specific path for the config file.
    pub fn get_config_path() -> String {
        paths::get_config_path()
    }

    /// Returns the platform-specific path for the log directory.
    pub fn get_log_dir_path() -> String {
        paths::get_log_dir_path()
    }

    /// Displays current configuration settings to stdout.
    ///
    /// # Notes
    /// - Shows config file location and the effective settings (file + env)
    /// - Works when no config file exists by showing the defaults
    pub async fn display() -> Result<(), AppError> {
        let config_path = get_config_path();
        let log_dir = get_log_dir_path();
        let file_exists = Path::new(&config_path).exists();
        let config = Config::load().await?;

        println!("\nCurrent Configuration");
        println!("────────────────────────────────────");
        println!("Config Location:");
        println!("{config_path}");
        if !file_exists {
            println!("(No file found, showing defaults)");
        }
        println!("────────────────────────────────────");
        println!("API Domain:         {}", config.api_domain);
        println!("Formations Domain:  {}", config.formations_api_domain);
        println!("Refresh URL:        {}", config.refresh_url);
        println!("Database:           {}", config.database_url);
        println!("Account (env_key):  {}", config.env_key);
        println!("────────────────────────────────────");
        println!("Fetch Interval:     {} minutes", config.fetch_interval_minutes);
        println!(
            "Retry Policy:       {} attempts, {} ms base, x{}",
            config.max_retries, config.base_retry_delay_ms, config.backoff_multiplier
        );
        println!(
            "Rate Limit:         {} calls / {} ms",
            config.rate_limit_max_calls, config.rate_limit_period_ms
        );
        println!("HTTP Timeout:       {} seconds", config.http_timeout_seconds);
        match config.backfill_lookback {
            Some(n) => println!("Backfill Lookback:  {n} periods"),
            None => println!("Backfill Lookback:  full history"),
        }
        println!("Backfill Workers:   {}", config.backfill_concurrency);
        println!("Match Rescans:      {} periods", config.match_rescan_periods);
        println!("────────────────────────────────────");
        println!("Log File Location:");
        if let Some(custom_path) = &config.log_file_path {
            println!("{custom_path}");
        } else {
            println!("{log_dir}/{}", constants::LOG_FILE_NAME);
            println!("(Default location)");
        }

        Ok(())
    }

    /// Saves configuration to a custom file path.
    ///
    /// Creates the parent directory if it doesn't exist.
    ///
    /// # Errors
    /// * `AppError::Config` - If the provided path has no parent directory
    /// * `AppError::Io` - If there's an I/O error creating directories or writing the file
    /// * `AppError::TomlSerialize` - If there's an error serializing the configuration
    pub async fn save_to_path(&self, path: &str) -> Result<(), AppError> {
        let config_dir = Path::new(path).parent().ok_or_else(|| {
            AppError::config_error(format!("Path '{path}' has no parent directory"))
        })?;

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).await?;
        }
        let content = toml::to_string_pretty(self)?;
        let mut file = fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Loads configuration from a custom file path without env overrides.
    pub async fn load_from_path(path: &str) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
