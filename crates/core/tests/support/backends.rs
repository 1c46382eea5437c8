//! Mock port implementations
//!
//! Both mocks count calls and can hold individual requests behind a
//! [`Notify`] gate until the test releases them, which is how tests force
//! a stale fetch to land after a newer trigger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use propdesk_core::{broadcast_subscription, AuthSubscription, IdentityBackend, ProfileStore};
use propdesk_domain::{
    AuthNotification, Profile, PropDeskError, Result as DomainResult, Session,
};
use tokio::sync::{broadcast, Notify};

/// Scriptable identity backend.
pub struct MockIdentityBackend {
    session: Mutex<Option<Session>>,
    notifications: broadcast::Sender<AuthNotification>,
    fail_reads: AtomicBool,
    fail_sign_out: AtomicBool,
    sign_out_gate: Mutex<Option<Arc<Notify>>>,
    get_session_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MockIdentityBackend {
    pub fn new(session: Option<Session>) -> Arc<Self> {
        let (notifications, _) = broadcast::channel(32);
        Arc::new(Self {
            session: Mutex::new(session),
            notifications,
            fail_reads: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            sign_out_gate: Mutex::new(None),
            get_session_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        })
    }

    pub fn signed_out() -> Arc<Self> {
        Self::new(None)
    }

    /// Change what the next `get_session` returns.
    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock() = session;
    }

    /// Deliver a notification to every subscriber.
    pub fn emit(&self, notification: AuthNotification) {
        let _ = self.notifications.send(notification);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Make the next `sign_out` wait until the returned gate is notified.
    pub fn hold_sign_out(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.sign_out_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifications.receiver_count()
    }
}

#[async_trait]
impl IdentityBackend for MockIdentityBackend {
    async fn get_session(&self) -> DomainResult<Option<Session>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PropDeskError::Network("identity backend unreachable".into()));
        }
        Ok(self.session.lock().clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        broadcast_subscription(self.notifications.subscribe())
    }

    async fn sign_out(&self) -> DomainResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.sign_out_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(PropDeskError::Network("sign-out request failed".into()));
        }
        *self.session.lock() = None;
        Ok(())
    }
}

/// In-memory profile table with per-subject gates.
#[derive(Default)]
pub struct MockProfileStore {
    rows: Mutex<HashMap<String, Profile>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    fail: AtomicBool,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl MockProfileStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Arc<Self> {
        let store = Self::default();
        store.rows.lock().extend(profiles.into_iter().map(|p| (p.id.clone(), p)));
        Arc::new(store)
    }

    pub fn upsert(&self, profile: Profile) {
        self.rows.lock().insert(profile.id.clone(), profile);
    }

    /// Hold the next read for `subject_id` until the gate is notified.
    pub fn hold(&self, subject_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(subject_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn get_profile(&self, subject_id: &str) -> DomainResult<Option<Profile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().remove(subject_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let result = if self.fail.load(Ordering::SeqCst) {
            Err(PropDeskError::Network("profile query failed".into()))
        } else {
            Ok(self.rows.lock().get(subject_id).cloned())
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}
