//! Identity-backend session handle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque proof of authentication issued by the identity backend.
///
/// Treated as a value object: the backend creates, refreshes and revokes it.
/// The session layer only reads the subject and the validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Subject identifier (the backend's user id)
    pub subject_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Not-before timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session with no expiry metadata.
    pub fn new(subject_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            access_token: access_token.into(),
            refresh_token: None,
            email: None,
            issued_at: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_validity(
        mut self,
        issued_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.issued_at = issued_at;
        self.expires_at = expires_at;
        self
    }

    /// Whether the session is outside its validity window at `now`.
    ///
    /// Sessions without an expiry are considered live until the backend
    /// says otherwise.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.issued_at.is_some_and(|nbf| now < nbf) {
            return true;
        }
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Seconds until expiry, negative once expired.
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|exp| (exp - Utc::now()).num_seconds())
    }

    /// Whether `other` belongs to the same subject.
    pub fn same_subject(&self, other: &Session) -> bool {
        self.subject_id == other.subject_id
    }
}
