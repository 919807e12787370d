//! One-time creation of the default account from the environment.

use serde::Deserialize;
use tracing::info;

use super::error::CredentialError;
use super::store::CredentialStore;
use super::types::{Credential, TokenTriple};
use crate::constants::env_vars;

#[derive(Deserialize)]
struct TokenFile {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    id_token: String,
}

/// Reads the bootstrap triple.
///
/// `CARTOLA_TOKEN_FILE` (a JSON file with the three tokens) takes precedence
/// over the individual `CARTOLA_*_TOKEN` variables. The id token may be empty;
/// access and refresh tokens may not.
pub async fn tokens_from_env() -> Result<TokenTriple, CredentialError> {
    if let Ok(path) = std::env::var(env_vars::TOKEN_FILE) {
        let content = tokio::fs::read_to_string(&path).await?;
        let file: TokenFile = serde_json::from_str(&content)?;
        return require_complete(TokenTriple::new(
            file.access_token,
            file.refresh_token,
            file.id_token,
        ));
    }

    let read = |name: &str| std::env::var(name).unwrap_or_default();
    require_complete(TokenTriple::new(
        read(env_vars::ACCESS_TOKEN),
        read(env_vars::REFRESH_TOKEN),
        read(env_vars::ID_TOKEN),
    ))
}

fn require_complete(tokens: TokenTriple) -> Result<TokenTriple, CredentialError> {
    if tokens.access_token.trim().is_empty() {
        return Err(CredentialError::Incomplete(format!(
            "{} is not set",
            env_vars::ACCESS_TOKEN
        )));
    }
    if tokens.refresh_token.trim().is_empty() {
        return Err(CredentialError::Incomplete(format!(
            "{} is not set",
            env_vars::REFRESH_TOKEN
        )));
    }
    Ok(tokens)
}

/// Inserts the account `env_key` unless it already exists.
///
/// Returns `true` when a new credential was written.
pub async fn bootstrap_credential(
    store: &dyn CredentialStore,
    env_key: &str,
    tokens: TokenTriple,
) -> Result<bool, CredentialError> {
    let credential = Credential::new(format!("{env_key} (bootstrap)"), env_key, tokens);
    let inserted = store.insert_if_absent(&credential).await?;
    if inserted {
        info!("Bootstrapped credential for {env_key}");
    } else {
        info!("Credential for {env_key} already exists, leaving it untouched");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_utils::MemoryCredentialStore;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            std::env::remove_var(env_vars::TOKEN_FILE);
            std::env::remove_var(env_vars::ACCESS_TOKEN);
            std::env::remove_var(env_vars::REFRESH_TOKEN);
            std::env::remove_var(env_vars::ID_TOKEN);
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_tokens_from_env_vars() {
        clear_env();
        unsafe {
            std::env::set_var(env_vars::ACCESS_TOKEN, "a");
            std::env::set_var(env_vars::REFRESH_TOKEN, "r");
        }
        let tokens = tokens_from_env().await;
        clear_env();

        assert_eq!(tokens.unwrap(), TokenTriple::new("a", "r", ""));
    }

    #[tokio::test]
    #[serial]
    async fn test_tokens_from_file_take_precedence() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("tokens.json");
        tokio::fs::write(
            &path,
            r#"{"access_token": "fa", "refresh_token": "fr", "id_token": "fi"}"#,
        )
        .await
        .unwrap();
        unsafe {
            std::env::set_var(env_vars::TOKEN_FILE, &path);
            std::env::set_var(env_vars::ACCESS_TOKEN, "ignored");
        }
        let tokens = tokens_from_env().await;
        clear_env();

        assert_eq!(tokens.unwrap(), TokenTriple::new("fa", "fr", "fi"));
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_refresh_token_is_incomplete() {
        clear_env();
        unsafe {
            std::env::set_var(env_vars::ACCESS_TOKEN, "a");
        }
        let result = tokens_from_env().await;
        clear_env();

        assert!(matches!(result, Err(CredentialError::Incomplete(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_is_insert_only() {
        let store = MemoryCredentialStore::default();

        let first = bootstrap_credential(&store, "AERO_RBSV", TokenTriple::new("a", "r", "i"))
            .await
            .unwrap();
        let second = bootstrap_credential(&store, "AERO_RBSV", TokenTriple::new("x", "y", "z"))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let stored = store.snapshot("AERO_RBSV").unwrap();
        assert_eq!(stored.tokens.access_token, "a");
        assert_eq!(stored.strategy, 1);
    }
}
