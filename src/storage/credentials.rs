//! `credenciais` table behind the `CredentialStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use super::DbPool;
use crate::credentials::{Credential, CredentialError, CredentialStore, TokenTriple};

#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: DbPool,
}

impl SqliteCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, env_key: &str) -> Result<Option<Credential>, CredentialError> {
        let row = sqlx::query(
            "SELECT nome, env_key, access_token, refresh_token, id_token, estrategia, \
             last_refreshed_ms FROM credenciais WHERE env_key = ?",
        )
        .bind(env_key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let text = |column: &str| -> Result<String, sqlx::Error> {
            Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
        };
        let last_refreshed_ms: Option<i64> = row.try_get("last_refreshed_ms")?;

        Ok(Some(Credential {
            name: row.try_get("nome")?,
            env_key: row.try_get("env_key")?,
            tokens: TokenTriple::new(
                text("access_token")?,
                text("refresh_token")?,
                text("id_token")?,
            ),
            strategy: row.try_get("estrategia")?,
            last_refreshed_at: last_refreshed_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
        }))
    }

    async fn put(&self, env_key: &str, tokens: &TokenTriple) -> Result<(), CredentialError> {
        let result = sqlx::query(
            "UPDATE credenciais SET access_token = ?, refresh_token = ?, id_token = ?, \
             last_refreshed_ms = ? WHERE env_key = ?",
        )
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(&tokens.id_token)
        .bind(Utc::now().timestamp_millis())
        .bind(env_key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound(env_key.to_string()));
        }
        debug!("Persisted refreshed tokens for {env_key}");
        Ok(())
    }

    async fn insert_if_absent(&self, credential: &Credential) -> Result<bool, CredentialError> {
        let result = sqlx::query(
            "INSERT INTO credenciais (nome, env_key, access_token, refresh_token, id_token, \
             estrategia, last_refreshed_ms) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(env_key) DO NOTHING",
        )
        .bind(&credential.name)
        .bind(&credential.env_key)
        .bind(&credential.tokens.access_token)
        .bind(&credential.tokens.refresh_token)
        .bind(&credential.tokens.id_token)
        .bind(credential.strategy.max(1))
        .bind(credential.last_refreshed_at.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
