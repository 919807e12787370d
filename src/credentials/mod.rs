//! Credential lifecycle: storage seam, refresh exchange and per-account token cache.

pub mod bootstrap;
pub mod error;
pub mod manager;
pub mod refresher;
pub mod store;
pub mod types;

pub use error::CredentialError;
pub use manager::CredentialManager;
pub use refresher::{HttpTokenRefresher, TokenRefresher};
pub use store::CredentialStore;
pub use types::{Credential, RefreshedTokens, TokenTriple};
