//! URL building utilities for API endpoints

use crate::api::models::PeriodId;

fn trim(domain: &str) -> &str {
    domain.trim_end_matches('/')
}

/// Builds the market status URL.
///
/// # Example
/// ```
/// use cartola_fetcher::api::build_status_url;
///
/// let url = build_status_url("https://api.example.com/");
/// assert_eq!(url, "https://api.example.com/mercado/status");
/// ```
pub fn build_status_url(api_domain: &str) -> String {
    format!("{}/mercado/status", trim(api_domain))
}

/// Builds the live market snapshot URL (athletes, clubs, positions, statuses).
pub fn build_market_url(api_domain: &str) -> String {
    format!("{}/atletas/mercado", trim(api_domain))
}

/// Builds the scored-players URL for one period.
///
/// # Example
/// ```
/// use cartola_fetcher::api::build_scored_url;
///
/// let url = build_scored_url("https://api.example.com", 7);
/// assert_eq!(url, "https://api.example.com/atletas/pontuados/7");
/// ```
pub fn build_scored_url(api_domain: &str, period: PeriodId) -> String {
    format!("{}/atletas/pontuados/{period}", trim(api_domain))
}

/// Builds the matches URL for one period.
pub fn build_matches_url(api_domain: &str, period: PeriodId) -> String {
    format!("{}/partidas/{period}", trim(api_domain))
}

/// Builds the formation schemes URL. Formations live on their own host.
pub fn build_formations_url(formations_api_domain: &str) -> String {
    format!("{}/esquemas", trim(formations_api_domain))
}

/// Builds the authenticated market highlights URL.
pub fn build_highlights_url(api_domain: &str) -> String {
    format!("{}/auth/mercado/destaques", trim(api_domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls() {
        let domain = "https://api.cartola.globo.com";
        assert_eq!(
            build_market_url(domain),
            "https://api.cartola.globo.com/atletas/mercado"
        );
        assert_eq!(
            build_matches_url(domain, 12),
            "https://api.cartola.globo.com/partidas/12"
        );
        assert_eq!(
            build_highlights_url(domain),
            "https://api.cartola.globo.com/auth/mercado/destaques"
        );
    }

    #[test]
    fn test_formations_url_uses_its_own_domain() {
        assert_eq!(
            build_formations_url("https://api.cartolafc.globo.com/"),
            "https://api.cartolafc.globo.com/esquemas"
        );
    }
}
