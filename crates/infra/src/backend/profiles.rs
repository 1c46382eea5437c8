//! Profile table adapter
//!
//! Reads one row from the configured profiles table through the REST data
//! API, authenticated as the signed-in user so row-level policies apply.

use std::sync::Arc;

use async_trait::async_trait;
use propdesk_core::ProfileStore;
use propdesk_domain::{BackendConfig, Profile, PropDeskError, Result, UserRole};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::identity::ensure_success;
use super::{AccessTokenProvider, Endpoints};
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Profile row as stored by the backend
///
/// Columns filled in during onboarding may still be null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub profile_completed: Option<bool>,
    #[serde(default)]
    pub onboarding_completed: Option<bool>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = PropDeskError;

    fn try_from(row: ProfileRow) -> Result<Self> {
        let role = row
            .role
            .as_deref()
            .ok_or_else(|| PropDeskError::InvalidInput(format!("profile {} has no role", row.id)))?
            .parse::<UserRole>()
            .map_err(PropDeskError::InvalidInput)?;

        Ok(Profile {
            id: row.id,
            first_name: row.first_name.unwrap_or_default(),
            last_name: row.last_name.unwrap_or_default(),
            role,
            phone: row.phone.filter(|p| !p.trim().is_empty()),
            is_verified: row.is_verified.unwrap_or(false),
            profile_completed: row.profile_completed.unwrap_or(false),
            onboarding_completed: row.onboarding_completed.unwrap_or(false),
            avatar_url: row.avatar_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

/// REST profile store
pub struct RestProfileStore {
    http: HttpClient,
    endpoints: Endpoints,
    table: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl RestProfileStore {
    /// # Errors
    /// Returns `PropDeskError::Config` if the base URL or anon key is invalid
    pub fn new(config: &BackendConfig, tokens: Arc<dyn AccessTokenProvider>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::for_backend(config)?,
            endpoints: Endpoints::new(config)?,
            table: config.profiles_table.clone(),
            tokens,
        })
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn get_profile(&self, subject_id: &str) -> Result<Option<Profile>> {
        let token = self.tokens.access_token().await?;

        let mut url = self.endpoints.join(&format!("rest/v1/{}", self.table))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{subject_id}"))
            .append_pair("select", "*");

        let request = self
            .http
            .request(Method::GET, url)
            .header(ACCEPT, "application/json")
            .bearer_auth(token);
        let response = ensure_success(self.http.send(request).await?).await?;

        let rows: Vec<ProfileRow> =
            response.json().await.map_err(|e| PropDeskError::from(InfraError::from(e)))?;

        match rows.into_iter().next() {
            Some(row) => Profile::try_from(row).map(Some),
            None => {
                debug!("Profile row not found");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for RestProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProfileStore")
            .field("endpoints", &self.endpoints)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
