//! The remote API seen by the sync engine.

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use super::fetch_utils::fetch;
use super::models::{
    Formation, Highlight, MarketResponse, MarketStatus, MatchesResponse, PeriodId, ScoredResponse,
};
use super::urls::{
    build_formations_url, build_highlights_url, build_market_url, build_matches_url,
    build_scored_url, build_status_url,
};
use crate::config::Config;
use crate::error::AppError;

/// One call per remote entity.
///
/// Implementations issue exactly one request per call. An empty payload is
/// reported as `ApiNoData` so callers never mistake "nothing there" for a fault.
#[async_trait]
pub trait CartolaApi: Send + Sync {
    async fn fetch_status(&self) -> Result<MarketStatus, AppError>;

    async fn fetch_market(&self) -> Result<MarketResponse, AppError>;

    async fn fetch_scored(&self, period: PeriodId) -> Result<ScoredResponse, AppError>;

    async fn fetch_matches(&self, period: PeriodId) -> Result<MatchesResponse, AppError>;

    async fn fetch_formations(&self) -> Result<Vec<Formation>, AppError>;

    /// Requires a bearer access token; a rejected token yields `AuthExpired`.
    async fn fetch_highlights(&self, access_token: &str) -> Result<Vec<Highlight>, AppError>;
}

/// `CartolaApi` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpCartolaApi {
    client: Client,
    api_domain: String,
    formations_api_domain: String,
}

impl HttpCartolaApi {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_domain: config.api_domain.clone(),
            formations_api_domain: config.formations_api_domain.clone(),
        }
    }
}

#[async_trait]
impl CartolaApi for HttpCartolaApi {
    #[instrument(skip(self))]
    async fn fetch_status(&self) -> Result<MarketStatus, AppError> {
        let url = build_status_url(&self.api_domain);
        fetch(&self.client, &url, None).await
    }

    #[instrument(skip(self))]
    async fn fetch_market(&self) -> Result<MarketResponse, AppError> {
        let url = build_market_url(&self.api_domain);
        let market: MarketResponse = fetch(&self.client, &url, None).await?;
        if market.atletas.is_empty() && market.clubes.is_empty() {
            return Err(AppError::api_no_data("Market snapshot is empty", url));
        }
        Ok(market)
    }

    #[instrument(skip(self))]
    async fn fetch_scored(&self, period: PeriodId) -> Result<ScoredResponse, AppError> {
        let url = build_scored_url(&self.api_domain, period);
        let scored: ScoredResponse = fetch(&self.client, &url, None).await?;
        if scored.atletas.is_empty() {
            return Err(AppError::api_no_data(
                format!("No scored athletes for period {period}"),
                url,
            ));
        }
        Ok(scored)
    }

    #[instrument(skip(self))]
    async fn fetch_matches(&self, period: PeriodId) -> Result<MatchesResponse, AppError> {
        let url = build_matches_url(&self.api_domain, period);
        let matches: MatchesResponse = fetch(&self.client, &url, None).await?;
        if matches.partidas.is_empty() {
            return Err(AppError::api_no_data(
                format!("No matches for period {period}"),
                url,
            ));
        }
        Ok(matches)
    }

    #[instrument(skip(self))]
    async fn fetch_formations(&self) -> Result<Vec<Formation>, AppError> {
        let url = build_formations_url(&self.formations_api_domain);
        let formations: Vec<Formation> = fetch(&self.client, &url, None).await?;
        if formations.is_empty() {
            return Err(AppError::api_no_data("No formations returned", url));
        }
        Ok(formations)
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_highlights(&self, access_token: &str) -> Result<Vec<Highlight>, AppError> {
        let url = build_highlights_url(&self.api_domain);
        let highlights: Vec<Highlight> = fetch(&self.client, &url, Some(access_token)).await?;
        if highlights.is_empty() {
            return Err(AppError::api_no_data("No highlights returned", url));
        }
        Ok(highlights)
    }
}
