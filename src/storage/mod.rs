//! Persistence layer over SQLite with sqlx.
//!
//! Connection pool management, the schema, the `SyncStore` seam used by the
//! sync engine and the credential store.

pub mod credentials;
pub mod schema;
pub mod sync_store;
pub mod tables;

pub use credentials::SqliteCredentialStore;
pub use sync_store::{SqliteSyncStore, SyncStore};
pub use tables::Table;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::constants::database::{ACQUIRE_TIMEOUT_SECONDS, BUSY_TIMEOUT_MS, DEFAULT_POOL_SIZE};

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

/// Opens the pool and creates the schema if needed.
///
/// In-memory URLs get a single connection that never expires, since every
/// SQLite connection to `:memory:` is its own database.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)?
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .foreign_keys(false)
        .create_if_missing(true);

    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let mut pool_options =
        SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECONDS));
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(DEFAULT_POOL_SIZE)
    };

    if !in_memory && let Some(parent) = sqlite_file_parent(database_url) {
        tokio::fs::create_dir_all(&parent).await.map_err(sqlx::Error::Io)?;
    }

    let pool = pool_options.connect_with(options).await?;
    schema::ensure_schema(&pool).await?;
    info!("Database ready at {database_url}");
    Ok(pool)
}

/// Fresh in-memory database with the schema applied. Used by tests and `--once` dry runs.
pub async fn init_memory_pool() -> Result<DbPool, sqlx::Error> {
    init_pool("sqlite::memory:").await
}

fn sqlite_file_parent(database_url: &str) -> Option<std::path::PathBuf> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    let parent = std::path::Path::new(path).parent()?;
    if parent.as_os_str().is_empty() {
        None
    } else {
        Some(parent.to_path_buf())
    }
}
