//! Aggregate auth state and backend notifications

use serde::{Deserialize, Serialize};

use super::profile::Profile;
use super::session::Session;

/// Snapshot of "who is logged in and what is their profile".
///
/// `user` is a progressively available enrichment: it may be `None` while
/// `session` is set (profile pending, missing or failed to load). Gate UI on
/// [`AuthState::is_authenticated`], never on `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub session: Option<Session>,
    pub user: Option<Profile>,
    pub is_loading: bool,
}

impl AuthState {
    /// State before the first bootstrap has completed.
    pub fn initial() -> Self {
        Self { session: None, user: None, is_loading: true }
    }

    /// Settled, signed-out state.
    pub fn signed_out() -> Self {
        Self { session: None, user: None, is_loading: false }
    }

    /// Derived from `session` alone.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Authenticated, but the profile is not available (yet).
    pub fn is_profile_pending(&self) -> bool {
        self.session.is_some() && self.user.is_none()
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.subject_id.as_str())
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Kind of auth-state change pushed by the identity backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl std::fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an auth-state notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthNotification {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthNotification {
    pub fn new(event: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    pub fn signed_in(session: Session) -> Self {
        Self::new(AuthChangeEvent::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthChangeEvent::SignedOut, None)
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self::new(AuthChangeEvent::TokenRefreshed, Some(session))
    }
}
