//! Identity and profile backend adapters
//!
//! - [`RestIdentityBackend`]: GoTrue-compatible auth endpoints under
//!   `/auth/v1`
//! - [`RestProfileStore`]: PostgREST-style profile table under `/rest/v1`
//! - [`InMemoryIdentityBackend`] / [`InMemoryProfileStore`]: in-process
//!   adapters for demos and downstream tests

pub mod identity;
pub mod memory;
pub mod profiles;

use async_trait::async_trait;
use propdesk_domain::{BackendConfig, PropDeskError, Result};
use url::Url;

use crate::errors::InfraError;

pub use identity::RestIdentityBackend;
pub use memory::{InMemoryIdentityBackend, InMemoryProfileStore};
pub use profiles::{ProfileRow, RestProfileStore};

/// Trait for providing access tokens
///
/// Lets the data adapters authenticate as the signed-in user without knowing
/// how the session is held.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token, refreshing it first if it has expired.
    ///
    /// # Errors
    /// Returns `PropDeskError::Auth` when no usable session exists
    async fn access_token(&self) -> Result<String>;
}

/// URL builder rooted at the configured backend base.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub(crate) fn new(config: &BackendConfig) -> Result<Self> {
        // Trailing slash so `join` appends instead of replacing the last segment.
        let base = Url::parse(&format!("{}/", config.base_url()))
            .map_err(|e| PropDeskError::from(InfraError::from(e)))?;
        Ok(Self { base })
    }

    pub(crate) fn join(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| PropDeskError::from(InfraError::from(e)))
    }
}
