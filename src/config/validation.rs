use std::path::Path;

use super::Config;
use crate::constants::schedule::MAX_INTERVAL_MINUTES;
use crate::error::AppError;

/// Validates the configuration settings
///
/// # Validation Rules
/// - API domains cannot be empty and must look like a URL or domain name
/// - Database URL must use the sqlite scheme
/// - Interval, retry attempts, rate-limit ceiling and window must be positive
/// - Interval cannot exceed one week
/// - Backoff multiplier must be at least 1.0 so delays never shrink
/// - If log file path is provided, its parent directory must exist or be creatable
pub fn validate_config(config: &Config) -> Result<(), AppError> {
    validate_domain("API domain", &config.api_domain)?;
    validate_domain("Formations API domain", &config.formations_api_domain)?;
    validate_domain("Refresh URL", &config.refresh_url)?;

    if !config.database_url.starts_with("sqlite:") {
        return Err(AppError::config_error(format!(
            "Database URL must start with 'sqlite:', got '{}'",
            config.database_url
        )));
    }

    if config.env_key.trim().is_empty() {
        return Err(AppError::config_error("env_key cannot be empty"));
    }

    if config.fetch_interval_minutes == 0 {
        return Err(AppError::config_error(
            "fetch_interval_minutes must be at least 1",
        ));
    }

    if config.fetch_interval_minutes > MAX_INTERVAL_MINUTES {
        return Err(AppError::config_error(format!(
            "fetch_interval_minutes cannot exceed {MAX_INTERVAL_MINUTES}, got {}",
            config.fetch_interval_minutes
        )));
    }

    if config.max_retries == 0 {
        return Err(AppError::config_error("max_retries must be at least 1"));
    }

    if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
        return Err(AppError::config_error(
            "backoff_multiplier must be a finite number >= 1.0",
        ));
    }

    if config.rate_limit_max_calls == 0 {
        return Err(AppError::config_error(
            "rate_limit_max_calls must be at least 1",
        ));
    }

    if config.rate_limit_period_ms == 0 {
        return Err(AppError::config_error(
            "rate_limit_period_ms must be greater than zero",
        ));
    }

    if config.http_timeout_seconds == 0 {
        return Err(AppError::config_error(
            "http_timeout_seconds must be greater than zero",
        ));
    }

    if config.backfill_concurrency == 0 {
        return Err(AppError::config_error(
            "backfill_concurrency must be at least 1",
        ));
    }

    if let Some(log_path) = &config.log_file_path {
        if log_path.is_empty() {
            return Err(AppError::config_error("Log file path cannot be empty"));
        }

        if let Some(parent) = Path::new(log_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::config_error(format!(
                    "Cannot create log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

fn validate_domain(label: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::config_error(format!("{label} cannot be empty")));
    }

    if !value.starts_with("http://")
        && !value.starts_with("https://")
        && !value.contains('.')
        && !value.starts_with("localhost")
    {
        return Err(AppError::config_error(format!(
            "{label} must be a valid URL or domain name"
        )));
    }

    Ok(())
}
