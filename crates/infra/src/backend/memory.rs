//! In-process adapters
//!
//! Deterministic stand-ins for the REST adapters: sign-in, sign-out and
//! expiry are driven by the caller, and either side can be made unavailable
//! to exercise failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use propdesk_core::{broadcast_subscription, AuthSubscription, IdentityBackend, ProfileStore};
use propdesk_domain::{AuthChangeEvent, AuthNotification, Profile, PropDeskError, Result, Session};
use tokio::sync::broadcast;
use tracing::debug;

/// Identity backend held entirely in memory
#[derive(Debug)]
pub struct InMemoryIdentityBackend {
    session: RwLock<Option<Session>>,
    notifications: broadcast::Sender<AuthNotification>,
    unavailable: AtomicBool,
    reject_sign_out: AtomicBool,
}

impl InMemoryIdentityBackend {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(32);
        Self {
            session: RwLock::new(None),
            notifications,
            unavailable: AtomicBool::new(false),
            reject_sign_out: AtomicBool::new(false),
        }
    }

    /// Start with `session` already established (no notification).
    pub fn with_session(session: Session) -> Self {
        let backend = Self::new();
        *backend.session.write() = Some(session);
        backend
    }

    /// Establish `session` and broadcast `SIGNED_IN`.
    pub fn sign_in(&self, session: Session) {
        debug!(subject_id = %session.subject_id, "in-memory sign-in");
        *self.session.write() = Some(session.clone());
        self.broadcast(AuthNotification::signed_in(session));
    }

    /// Replace the session tokens and broadcast `TOKEN_REFRESHED`.
    pub fn refresh(&self, session: Session) {
        *self.session.write() = Some(session.clone());
        self.broadcast(AuthNotification::token_refreshed(session));
    }

    /// Let the held session lapse silently, as a cookie expiring in another
    /// tab would.
    pub fn expire(&self) {
        if let Some(session) = self.session.write().as_mut() {
            let now = Utc::now();
            session.issued_at = Some(now - ChronoDuration::hours(2));
            session.expires_at = Some(now - ChronoDuration::seconds(1));
        }
    }

    /// Forget the session silently.
    pub fn revoke(&self) {
        self.session.write().take();
    }

    /// Broadcast an arbitrary notification.
    pub fn notify(&self, event: AuthChangeEvent, session: Option<Session>) {
        self.broadcast(AuthNotification::new(event, session));
    }

    /// Make `get_session` fail with a network error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `sign_out` report a backend rejection.
    pub fn set_reject_sign_out(&self, reject: bool) {
        self.reject_sign_out.store(reject, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifications.receiver_count()
    }

    fn broadcast(&self, notification: AuthNotification) {
        let _ = self.notifications.send(notification);
    }
}

impl Default for InMemoryIdentityBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityBackend for InMemoryIdentityBackend {
    async fn get_session(&self) -> Result<Option<Session>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PropDeskError::Network("identity backend unavailable".into()));
        }
        Ok(self.session.read().clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        broadcast_subscription(self.notifications.subscribe())
    }

    async fn sign_out(&self) -> Result<()> {
        let previous = self.session.write().take();
        if previous.is_some() {
            self.broadcast(AuthNotification::signed_out());
        }
        if self.reject_sign_out.load(Ordering::SeqCst) {
            return Err(PropDeskError::Network("sign-out rejected".into()));
        }
        Ok(())
    }
}

/// Profile table held in memory
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    rows: RwLock<HashMap<String, Profile>>,
    unavailable: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        for profile in profiles {
            store.upsert(profile);
        }
        store
    }

    pub fn upsert(&self, profile: Profile) {
        self.rows.write().insert(profile.id.clone(), profile);
    }

    pub fn remove(&self, subject_id: &str) -> Option<Profile> {
        self.rows.write().remove(subject_id)
    }

    /// Make reads fail with a network error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, subject_id: &str) -> Result<Option<Profile>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PropDeskError::Network("profile store unavailable".into()));
        }
        Ok(self.rows.read().get(subject_id).cloned())
    }
}
