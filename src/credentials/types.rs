use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The {access, refresh, identity} tokens used against protected endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTriple {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
}

impl TokenTriple {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        id_token: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            id_token: id_token.into(),
        }
    }

    /// Applies a refresh result. Tokens the exchange did not return keep their old value.
    pub fn merged_with(&self, refreshed: RefreshedTokens) -> TokenTriple {
        TokenTriple {
            access_token: refreshed.access_token,
            refresh_token: refreshed
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.refresh_token.clone()),
            id_token: refreshed
                .id_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.id_token.clone()),
        }
    }
}

// Tokens never end up in logs.
impl std::fmt::Debug for TokenTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTriple")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("id_token", &redact(&self.id_token))
            .finish()
    }
}

fn redact(token: &str) -> String {
    if token.is_empty() {
        "<empty>".to_string()
    } else {
        format!("<{} chars>", token.chars().count())
    }
}

/// Body returned by a successful refresh exchange.
#[derive(Clone, Deserialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("id_token", &self.id_token.as_deref().map(redact))
            .finish()
    }
}

/// A stored account.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub name: String,
    pub env_key: String,
    pub tokens: TokenTriple,
    /// Reserved for multi-account policies; always >= 1.
    pub strategy: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(name: impl Into<String>, env_key: impl Into<String>, tokens: TokenTriple) -> Self {
        Self {
            name: name.into(),
            env_key: env_key.into(),
            tokens,
            strategy: 1,
            last_refreshed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_missing_tokens() {
        let current = TokenTriple::new("a1", "r1", "i1");
        let merged = current.merged_with(RefreshedTokens {
            access_token: "a2".to_string(),
            refresh_token: None,
            id_token: Some(String::new()),
        });
        assert_eq!(merged, TokenTriple::new("a2", "r1", "i1"));
    }

    #[test]
    fn test_merge_replaces_returned_tokens() {
        let current = TokenTriple::new("a1", "r1", "i1");
        let merged = current.merged_with(RefreshedTokens {
            access_token: "a2".to_string(),
            refresh_token: Some("r2".to_string()),
            id_token: Some("i2".to_string()),
        });
        assert_eq!(merged, TokenTriple::new("a2", "r2", "i2"));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", TokenTriple::new("secret-access", "", "x"));
        assert!(!rendered.contains("secret-access"));
        assert!(rendered.contains("<13 chars>"));
        assert!(rendered.contains("<empty>"));
    }

    #[test]
    fn test_refreshed_tokens_debug_redacts() {
        let refreshed = RefreshedTokens {
            access_token: "fresh-access".to_string(),
            refresh_token: Some("fresh-refresh".to_string()),
            id_token: None,
        };
        let rendered = format!("{refreshed:?}");
        assert!(!rendered.contains("fresh-access"));
        assert!(!rendered.contains("fresh-refresh"));
        assert!(rendered.contains("<12 chars>"));
        assert!(rendered.contains("None"));
    }
}
