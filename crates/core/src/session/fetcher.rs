//! Profile fetcher
//!
//! Pure request/response over [`ProfileStore`]: no state, no retries. A
//! missing row is an expected outcome (sign-up not finished yet) and comes
//! back as `Ok(None)`.

use std::sync::Arc;
use std::time::Duration;

use propdesk_domain::{Profile, PropDeskError};
use tracing::{debug, instrument};

use super::error::{SessionError, SessionResult};
use super::ports::ProfileStore;

/// Loads the extended profile for an authenticated subject
#[derive(Clone)]
pub struct ProfileFetcher {
    store: Arc<dyn ProfileStore>,
    timeout: Duration,
}

impl ProfileFetcher {
    /// Create a fetcher bounding each read by `timeout`
    pub fn new(store: Arc<dyn ProfileStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Fetch the profile for `subject_id`
    ///
    /// # Returns
    /// `Some(profile)` when a row exists, `None` when it does not
    ///
    /// # Errors
    /// Returns [`SessionError::FetchFailed`] on transport failure, timeout,
    /// an empty subject id, or a row that belongs to another subject
    #[instrument(skip(self), fields(timeout_ms = self.timeout.as_millis() as u64))]
    pub async fn fetch(&self, subject_id: &str) -> SessionResult<Option<Profile>> {
        if subject_id.trim().is_empty() {
            return Err(failed(subject_id, "empty subject id"));
        }

        let outcome = tokio::time::timeout(self.timeout, self.store.get_profile(subject_id))
            .await
            .map_err(|_| failed(subject_id, format!("timed out after {:?}", self.timeout)))?;

        match outcome {
            Ok(Some(profile)) if !profile.belongs_to(subject_id) => Err(failed(
                subject_id,
                format!("store returned profile for another subject ({})", profile.id),
            )),
            Ok(Some(profile)) => Ok(Some(profile)),
            Ok(None) | Err(PropDeskError::NotFound(_)) => {
                debug!("no profile row for subject");
                Ok(None)
            }
            Err(err) => Err(failed(subject_id, err.to_string())),
        }
    }
}

impl std::fmt::Debug for ProfileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileFetcher").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

fn failed(subject_id: &str, reason: impl Into<String>) -> SessionError {
    SessionError::FetchFailed { subject_id: subject_id.to_string(), reason: reason.into() }
}
