//! Credential persistence abstraction.
//!
//! The SQLite implementation lives in `storage::credentials`.

use async_trait::async_trait;

use super::error::CredentialError;
use super::types::{Credential, TokenTriple};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the account; `Ok(None)` when it was never bootstrapped.
    async fn get(&self, env_key: &str) -> Result<Option<Credential>, CredentialError>;

    /// Persist a refreshed triple. Fails with `NotFound` for unknown accounts.
    async fn put(&self, env_key: &str, tokens: &TokenTriple) -> Result<(), CredentialError>;

    /// Create the account unless it already exists. Returns whether a row was inserted.
    async fn insert_if_absent(&self, credential: &Credential) -> Result<bool, CredentialError>;
}
