//! Session store
//!
//! Single source of truth for [`AuthState`]. Readers take whole snapshots or
//! subscribe to changes; the coordinator is the only writer and goes through
//! [`SessionStore::replace`].

use propdesk_domain::{AuthState, Profile, Session};
use tokio::sync::watch;
use tracing::warn;

/// Partial update applied by [`SessionStore::replace`]
///
/// `None` leaves a field unchanged; `Some(value)` overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthPatch {
    pub session: Option<Option<Session>>,
    pub user: Option<Option<Profile>>,
    pub is_loading: Option<bool>,
}

impl AuthPatch {
    /// Clear session and profile together
    pub fn cleared() -> Self {
        Self { session: Some(None), user: Some(None), is_loading: None }
    }

    /// Replace session and profile together
    pub fn resolved(session: Option<Session>, user: Option<Profile>) -> Self {
        Self { session: Some(session), user: Some(user), is_loading: None }
    }

    /// Only toggle the loading flag
    pub fn loading(is_loading: bool) -> Self {
        Self { is_loading: Some(is_loading), ..Self::default() }
    }

    pub fn with_loading(mut self, is_loading: bool) -> Self {
        self.is_loading = Some(is_loading);
        self
    }

    fn apply_to(self, state: &mut AuthState) {
        if let Some(session) = self.session {
            state.session = session;
        }
        if let Some(user) = self.user {
            state.user = user;
        }
        if let Some(is_loading) = self.is_loading {
            state.is_loading = is_loading;
        }
    }
}

/// Holds the current session and derived profile
#[derive(Debug)]
pub struct SessionStore {
    state: watch::Sender<AuthState>,
}

impl SessionStore {
    /// Create a store in the pre-bootstrap state (`is_loading = true`)
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        Self { state }
    }

    /// Clone the complete current state
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Apply `patch` atomically with respect to readers.
    ///
    /// A profile is never left visible without a matching live session:
    /// clearing the session clears the profile, and a profile whose id
    /// differs from the session subject is dropped.
    ///
    /// # Returns
    /// `true` if the visible state changed
    pub(crate) fn replace(&self, patch: AuthPatch) -> bool {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            patch.apply_to(state);

            let orphaned = match (&state.session, &state.user) {
                (None, Some(_)) => true,
                (Some(session), Some(user)) if !user.belongs_to(&session.subject_id) => {
                    warn!(
                        subject_id = %session.subject_id,
                        profile_id = %user.id,
                        "dropping profile that does not belong to the live session"
                    );
                    true
                }
                _ => false,
            };
            if orphaned {
                state.user = None;
            }

            *state != before
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
