//! The token refresh exchange.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ORIGIN, REFERER};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::error::CredentialError;
use super::types::{RefreshedTokens, TokenTriple};
use crate::config::Config;
use crate::constants::api::{REFRESH_ORIGIN, REFRESH_REFERER};

/// Trades the current triple for a fresh one.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, current: &TokenTriple) -> Result<RefreshedTokens, CredentialError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    refresh_token: &'a str,
    access_token: &'a str,
    id_token: &'a str,
}

/// Refresh over HTTP: `POST refresh_url` with the whole triple as JSON.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    refresh_url: String,
    client_id: String,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            refresh_url: config.refresh_url.clone(),
            client_id: config.refresh_client_id.clone(),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(skip(self, current), fields(url = %self.refresh_url))]
    async fn refresh(&self, current: &TokenTriple) -> Result<RefreshedTokens, CredentialError> {
        if current.refresh_token.is_empty() {
            return Err(CredentialError::RefreshFailed(
                "stored credential has no refresh token".to_string(),
            ));
        }

        let body = RefreshRequest {
            client_id: &self.client_id,
            refresh_token: &current.refresh_token,
            access_token: &current.access_token,
            id_token: &current.id_token,
        };

        let response = self
            .client
            .post(&self.refresh_url)
            .header(ORIGIN, REFRESH_ORIGIN)
            .header(REFERER, REFRESH_REFERER)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if status != reqwest::StatusCode::OK {
            warn!("Refresh exchange rejected with HTTP {}", status.as_u16());
            return Err(CredentialError::RefreshFailed(format!(
                "refresh endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let text = response.text().await?;
        let refreshed: RefreshedTokens = serde_json::from_str(&text).map_err(|e| {
            CredentialError::RefreshFailed(format!("malformed refresh response: {e}"))
        })?;

        if refreshed.access_token.is_empty() {
            return Err(CredentialError::RefreshFailed(
                "refresh response carried an empty access token".to_string(),
            ));
        }

        debug!("Refresh exchange succeeded");
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_test_http_client;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn refresher_for(server: &MockServer) -> HttpTokenRefresher {
        let config = Config {
            refresh_url: format!("{}/v1/refresh-token", server.uri()),
            ..Config::default()
        };
        HttpTokenRefresher::new(create_test_http_client(), &config)
    }

    #[tokio::test]
    async fn test_refresh_posts_full_triple() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/refresh-token"))
            .and(body_json(serde_json::json!({
                "client_id": "cartola-web@apps.globoid",
                "refresh_token": "r1",
                "access_token": "a1",
                "id_token": "i1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "a2",
                "refresh_token": "r2"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let refreshed = refresher_for(&mock_server)
            .refresh(&TokenTriple::new("a1", "r1", "i1"))
            .await
            .unwrap();
        assert_eq!(refreshed.access_token, "a2");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("r2"));
        assert!(refreshed.id_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_sends_web_origin_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/refresh-token"))
            .and(header("Origin", "https://cartola.globo.com"))
            .and(header("Referer", "https://cartola.globo.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "a2"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let refreshed = refresher_for(&mock_server)
            .refresh(&TokenTriple::new("a1", "r1", "i1"))
            .await
            .unwrap();
        assert_eq!(refreshed.access_token, "a2");
    }

    #[tokio::test]
    async fn test_refresh_non_200_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/refresh-token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let err = refresher_for(&mock_server)
            .refresh(&TokenTriple::new("a1", "r1", "i1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_malformed_body_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = refresher_for(&mock_server)
            .refresh(&TokenTriple::new("a1", "r1", "i1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_skips_network() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = refresher_for(&mock_server)
            .refresh(&TokenTriple::new("a1", "", "i1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::RefreshFailed(_)));
    }
}
