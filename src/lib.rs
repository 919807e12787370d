//! Cartola FC fetch orchestration library
//!
//! Keeps a relational copy of the Cartola FC market API in sync. A
//! [`sync::FetchCycle`] resolves the current round, refreshes the live market,
//! loads reference data once, backfills every completed round that is still
//! missing and fetches the authenticated highlights once per round. Every
//! outbound call goes through a shared [`sync::RateLimiter`] and a
//! [`sync::RetryPolicy`]; bearer tokens come from a
//! [`credentials::CredentialManager`] that refreshes them at most once at a
//! time per account.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cartola_fetcher::{Config, AppError};
//! use cartola_fetcher::api::{HttpCartolaApi, create_http_client_with_timeout};
//! use cartola_fetcher::credentials::{CredentialManager, HttpTokenRefresher};
//! use cartola_fetcher::storage::{self, SqliteCredentialStore, SqliteSyncStore};
//! use cartola_fetcher::sync::{CycleSettings, FetchCycle, RateLimiter, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let config = Config::load().await?;
//!     let pool = storage::init_pool(&config.database_url).await?;
//!     let client = create_http_client_with_timeout(config.http_timeout_seconds)?;
//!
//!     let credentials = CredentialManager::new(
//!         Arc::new(SqliteCredentialStore::new(pool.clone())),
//!         Arc::new(HttpTokenRefresher::new(client.clone(), &config)),
//!     );
//!     let cycle = FetchCycle::new(
//!         Arc::new(HttpCartolaApi::new(client, &config)),
//!         Arc::new(SqliteSyncStore::new(pool)),
//!         Arc::new(credentials),
//!         Arc::new(RateLimiter::from_config(&config)),
//!         RetryPolicy::from_config(&config),
//!         CycleSettings::from_config(&config),
//!     );
//!
//!     let report = cycle.run(&CancellationToken::new()).await;
//!     println!("cycle finished: {}", report.outcome);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod shutdown;
pub mod storage;
pub mod sync;
pub mod testing_utils;

// Re-export commonly used types for convenience
pub use api::{CartolaApi, HttpCartolaApi};
pub use config::Config;
pub use credentials::{CredentialError, CredentialManager};
pub use error::AppError;
pub use storage::{SqliteSyncStore, SyncStore, Table};
pub use sync::{CycleOutcome, CycleReport, FetchCycle, Scheduler, ServiceStatus};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
