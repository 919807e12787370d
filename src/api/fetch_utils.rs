//! Generic HTTP fetching with status classification
//!
//! A single request is issued per call. Retrying and pacing belong to the
//! caller (`RetryPolicy` and `RateLimiter`), so every outcome here is mapped to
//! an `AppError` variant the caller can classify.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument, warn};

use crate::error::AppError;

/// Fetches `url` and deserializes the body as `T`.
///
/// When `bearer` is set the request carries an `Authorization: Bearer` header.
///
/// # Errors
/// * `AuthExpired` for 401
/// * `ApiNotFound` for 404, `ApiRateLimit` for 429
/// * `ApiServiceUnavailable` for 502/503, `ApiServerError` for other 5xx
/// * `ApiClientError` for any other 4xx
/// * `NetworkTimeout` / `NetworkConnection` for transport failures
/// * `ApiNoData`, `ApiMalformedJson`, `ApiUnexpectedStructure` for bad bodies
#[instrument(skip(client, bearer), fields(authenticated = bearer.is_some()))]
pub(super) async fn fetch<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
) -> Result<T, AppError> {
    debug!("Fetching data from URL: {url}");

    let mut request = client.get(url);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Request failed for URL {}: {}", url, e);
            return Err(if e.is_timeout() {
                AppError::network_timeout(url)
            } else if e.is_connect() {
                AppError::network_connection(url, e.to_string())
            } else {
                AppError::ApiFetch(e)
            });
        }
    };

    let status = response.status();
    debug!("Response status: {status}");

    if !status.is_success() {
        return Err(classify_status(status, url));
    }

    let response_text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read response text from URL {}: {}", url, e);
            return Err(if e.is_timeout() {
                AppError::network_timeout(url)
            } else {
                AppError::ApiFetch(e)
            });
        }
    };

    debug!("Response length: {} bytes", response_text.len());

    parse_body(&response_text, url)
}

/// Maps a non-success status code onto the error taxonomy.
fn classify_status(status: StatusCode, url: &str) -> AppError {
    let status_code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("Unknown error");

    match status_code {
        401 => {
            warn!("HTTP 401 - access token rejected (URL: {})", url);
            AppError::auth_expired(url)
        }
        404 => {
            debug!("HTTP 404 - no data (URL: {})", url);
            AppError::api_not_found(url)
        }
        429 => {
            warn!("HTTP 429 - rate limited (URL: {})", url);
            AppError::api_rate_limit(reason, url)
        }
        400..=499 => {
            error!("HTTP {} - {} (URL: {})", status_code, reason, url);
            AppError::api_client_error(status_code, reason, url)
        }
        502 | 503 => {
            warn!("HTTP {} - {} (URL: {})", status_code, reason, url);
            AppError::api_service_unavailable(status_code, reason, url)
        }
        _ => {
            warn!("HTTP {} - {} (URL: {})", status_code, reason, url);
            AppError::api_server_error(status_code, reason, url)
        }
    }
}

/// Parses a response body, telling empty, non-JSON and wrongly shaped bodies apart.
fn parse_body<T: DeserializeOwned>(body: &str, url: &str) -> Result<T, AppError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(AppError::api_no_data("Response body is empty", url));
    }

    match serde_json::from_str::<T>(body) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            error!("Failed to parse API response: {} (URL: {})", e, url);
            if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                Err(AppError::api_malformed_json(
                    "Response is not valid JSON",
                    url,
                ))
            } else {
                Err(AppError::api_unexpected_structure(e.to_string(), url))
            }
        }
    }
}
