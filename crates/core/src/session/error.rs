//! Session layer error types

use propdesk_domain::PropDeskError;
use thiserror::Error;

/// Errors surfaced by the session layer
///
/// None of these leave the consumer-visible state in an undefined shape:
/// fetch failures degrade to `user = None` and sign-out failures are
/// reported after local state has already been cleared.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Profile read failed (transport fault, timeout or malformed row)
    #[error("Profile fetch failed for subject {subject_id}: {reason}")]
    FetchFailed { subject_id: String, reason: String },

    /// Backend rejected sign-out; local state was cleared anyway
    #[error("Sign-out failed: {0}")]
    SignOutFailed(#[source] PropDeskError),

    /// Coordinator can only be mounted once
    #[error("Session coordinator already mounted")]
    AlreadyMounted,

    /// Coordinator has been unmounted
    #[error("Session coordinator not mounted")]
    NotMounted,
}

impl From<SessionError> for PropDeskError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::FetchFailed { .. } => PropDeskError::Network(err.to_string()),
            SessionError::SignOutFailed(inner) => inner,
            SessionError::AlreadyMounted | SessionError::NotMounted => {
                PropDeskError::Internal(err.to_string())
            }
        }
    }
}

/// Convenience type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
