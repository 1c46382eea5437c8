//! Event coordinator
//!
//! Drives the [`SessionStore`] through a bounded set of transitions in
//! response to four trigger sources:
//!
//! 1. Mount (once): `Idle → Bootstrapping → Idle | SignedOut`
//! 2. Auth notifications: `SIGNED_OUT` clears immediately; any event carrying
//!    a session goes through `Refreshing` and writes session + profile
//!    together
//! 3. Navigation: confirmatory session re-read after a settling delay,
//!    coalesced (a new navigation resets the pending deadline)
//! 4. Window focus: the same re-read, immediately and independently
//!
//! Plus `logout()` and on-demand refreshes from the [`SessionHandle`].
//!
//! Every trigger takes a sequence number when it is observed. Work is written
//! back only if its sequence is still the newest; the check and the write
//! happen under one lock, so a slow fetch can never overwrite the state of a
//! newer trigger.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use propdesk_domain::{
    AuthChangeEvent, AuthNotification, AuthState, SessionSyncConfig, Session,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::error::{SessionError, SessionResult};
use super::fetcher::ProfileFetcher;
use super::handle::SessionHandle;
use super::ports::{AuthSubscription, IdentityBackend, ProfileStore};
use super::store::{AuthPatch, SessionStore};

/// Coordinator state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorPhase {
    Idle,
    Bootstrapping,
    Refreshing,
    SignedOut,
}

impl CoordinatorPhase {
    /// Consumers see `is_loading = true` exactly in these phases.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Bootstrapping | Self::Refreshing)
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Bootstrapping => 1,
            Self::Refreshing => 2,
            Self::SignedOut => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Bootstrapping,
            2 => Self::Refreshing,
            3 => Self::SignedOut,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for CoordinatorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Bootstrapping => "bootstrapping",
            Self::Refreshing => "refreshing",
            Self::SignedOut => "signed_out",
        };
        f.write_str(label)
    }
}

/// What caused a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Bootstrap,
    Auth(AuthChangeEvent),
    Navigation,
    Focus,
    Manual,
    Logout,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bootstrap => f.write_str("bootstrap"),
            Self::Auth(event) => write!(f, "auth:{event}"),
            Self::Navigation => f.write_str("navigation"),
            Self::Focus => f.write_str("focus"),
            Self::Manual => f.write_str("manual"),
            Self::Logout => f.write_str("logout"),
        }
    }
}

/// Signals forwarded from [`SessionHandle`] to the trigger loop
#[derive(Debug)]
pub(crate) enum Command {
    Navigation,
    Focus,
    Refresh(oneshot::Sender<()>),
}

/// Guards the sequence so "is this still the newest trigger?" and the store
/// write are one step.
///
/// Lock order is gate, then the store's watch lock. Nothing reachable from a
/// consumer takes the gate: phase and teardown are mirrored into atomics that
/// are only written while the gate is held, so reading them inside a
/// `watch::Receiver::wait_for` predicate cannot invert that order.
#[derive(Debug)]
struct Gate {
    sequence: u64,
}

/// Sole writer of the [`SessionStore`]
pub struct SessionCoordinator {
    identity: Arc<dyn IdentityBackend>,
    fetcher: ProfileFetcher,
    store: Arc<SessionStore>,
    config: SessionSyncConfig,
    gate: Mutex<Gate>,
    phase: AtomicU8,
    torn_down: AtomicBool,
    mounted: AtomicBool,
    cancel: CancellationToken,
}

impl SessionCoordinator {
    /// Create an unmounted coordinator
    ///
    /// # Arguments
    /// * `identity` - Identity backend (session reads, notifications,
    ///   sign-out)
    /// * `profiles` - Profile store queried by the fetcher
    /// * `config` - Settling delay and profile timeout
    pub fn new(
        identity: Arc<dyn IdentityBackend>,
        profiles: Arc<dyn ProfileStore>,
        config: SessionSyncConfig,
    ) -> Arc<Self> {
        let fetcher = ProfileFetcher::new(profiles, config.profile_timeout());
        Arc::new(Self {
            identity,
            fetcher,
            store: Arc::new(SessionStore::new()),
            config,
            gate: Mutex::new(Gate { sequence: 0 }),
            phase: AtomicU8::new(CoordinatorPhase::Idle.as_u8()),
            torn_down: AtomicBool::new(false),
            mounted: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to auth notifications, start bootstrap and spawn the trigger
    /// loop. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyMounted`] on any call after the first
    pub fn mount(self: &Arc<Self>) -> SessionResult<SessionHandle> {
        if self.mounted.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyMounted);
        }

        // Subscribe before reading the session so no notification is missed.
        let notifications = self.identity.on_auth_state_change();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let bootstrap = self.begin(Trigger::Bootstrap, CoordinatorPhase::Bootstrapping);

        tokio::spawn(Arc::clone(self).run(bootstrap, notifications, commands_rx));

        info!("Session coordinator mounted");
        Ok(SessionHandle::new(Arc::clone(self), commands_tx))
    }

    /// Release listeners and suppress any in-flight write.
    pub fn unmount(&self) {
        self.tear_down();
        self.cancel.cancel();
        debug!("Session coordinator unmounted");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Current phase of the state machine
    pub fn phase(&self) -> CoordinatorPhase {
        CoordinatorPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn state(&self) -> AuthState {
        self.store.snapshot()
    }

    /// Sign out: clear local state first, then await the backend.
    ///
    /// Local state is cleared whatever the backend answers, so the user is
    /// never trapped in a signed-in UI.
    ///
    /// # Errors
    /// Returns [`SessionError::SignOutFailed`] if the backend rejected the
    /// sign-out
    #[instrument(skip(self))]
    pub async fn logout(&self) -> SessionResult<()> {
        let sign_out = self.identity.sign_out();
        self.clear(Trigger::Logout);

        match sign_out.await {
            Ok(()) => {
                info!("Signed out");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Backend sign-out failed; local state already cleared");
                Err(SessionError::SignOutFailed(err))
            }
        }
    }

    /// Trigger loop: one per mounted coordinator.
    async fn run(
        self: Arc<Self>,
        bootstrap: Option<u64>,
        mut notifications: AuthSubscription,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut work = JoinSet::new();
        let mut subscribed = true;
        let mut navigation_deadline: Option<Instant> = None;

        if let Some(sequence) = bootstrap {
            work.spawn(Arc::clone(&self).bootstrap(sequence));
        }

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("Trigger loop cancelled");
                    break;
                }
                next = notifications.next(), if subscribed => match next {
                    Some(notification) => self.on_notification(notification, &mut work),
                    None => {
                        warn!("Auth notification stream closed");
                        subscribed = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Navigation) => {
                        // Coalesce: a pending re-read is pushed back, not duplicated.
                        navigation_deadline = Some(Instant::now() + self.config.settle_delay());
                    }
                    Some(Command::Focus) => self.spawn_reread(Trigger::Focus, None, &mut work),
                    Some(Command::Refresh(done)) => {
                        self.spawn_reread(Trigger::Manual, Some(done), &mut work);
                    }
                    None => {
                        debug!("All session handles dropped");
                        break;
                    }
                },
                () = sleep_until(navigation_deadline.unwrap_or_else(Instant::now)),
                    if navigation_deadline.is_some() =>
                {
                    navigation_deadline = None;
                    self.spawn_reread(Trigger::Navigation, None, &mut work);
                }
                Some(joined) = work.join_next(), if !work.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            error!(error = %err, "Session work task panicked");
                        }
                    }
                }
            }
        }

        self.tear_down();
        work.abort_all();
    }

    fn on_notification(self: &Arc<Self>, notification: AuthNotification, work: &mut JoinSet<()>) {
        let AuthNotification { event, session } = notification;
        let trigger = Trigger::Auth(event);

        match (event, session) {
            (AuthChangeEvent::SignedOut, _) => self.clear(trigger),
            (_, Some(session)) if session.is_expired() => {
                debug!(%trigger, "Notification carried an expired session");
                self.clear(trigger);
            }
            (_, Some(session)) => {
                if let Some(sequence) = self.begin(trigger, CoordinatorPhase::Refreshing) {
                    work.spawn(Arc::clone(self).resolve(sequence, trigger, session));
                }
            }
            (_, None) => debug!(%trigger, "Ignoring notification without a session"),
        }
    }

    fn spawn_reread(
        self: &Arc<Self>,
        trigger: Trigger,
        done: Option<oneshot::Sender<()>>,
        work: &mut JoinSet<()>,
    ) {
        let Some(sequence) = self.begin(trigger, CoordinatorPhase::Refreshing) else {
            return;
        };
        let coordinator = Arc::clone(self);
        work.spawn(async move {
            coordinator.reread(sequence, trigger).await;
            if let Some(done) = done {
                let _ = done.send(());
            }
        });
    }

    #[instrument(skip(self), fields(trigger = %Trigger::Bootstrap))]
    async fn bootstrap(self: Arc<Self>, sequence: u64) {
        let session = match self.identity.get_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "Session read failed during bootstrap; treating as signed out");
                None
            }
        };

        match session.filter(|s| !s.is_expired()) {
            Some(session) => self.resolve(sequence, Trigger::Bootstrap, session).await,
            None => {
                self.commit(
                    sequence,
                    Trigger::Bootstrap,
                    CoordinatorPhase::SignedOut,
                    AuthPatch::cleared(),
                );
            }
        }
    }

    /// Confirmatory re-read: a cheap resync of the session, not a
    /// re-authentication.
    #[instrument(skip(self))]
    async fn reread(self: Arc<Self>, sequence: u64, trigger: Trigger) {
        match self.identity.get_session().await {
            Ok(Some(session)) if !session.is_expired() => {
                self.resolve(sequence, trigger, session).await;
            }
            Ok(_) => {
                self.commit(sequence, trigger, CoordinatorPhase::SignedOut, AuthPatch::cleared());
            }
            Err(err) => {
                // Transient: keep what we have and settle back into the implied phase.
                warn!(error = %err, %trigger, "Session re-read failed; keeping current state");
                let phase = if self.store.snapshot().is_authenticated() {
                    CoordinatorPhase::Idle
                } else {
                    CoordinatorPhase::SignedOut
                };
                self.commit(sequence, trigger, phase, AuthPatch::default());
            }
        }
    }

    /// Fetch the profile for `session` and write both together.
    async fn resolve(self: Arc<Self>, sequence: u64, trigger: Trigger, session: Session) {
        let user = match self.fetcher.fetch(&session.subject_id).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, %trigger, "Profile unavailable; continuing without it");
                None
            }
        };

        let has_profile = user.is_some();
        if self.commit(
            sequence,
            trigger,
            CoordinatorPhase::Idle,
            AuthPatch::resolved(Some(session), user),
        ) {
            debug!(sequence, %trigger, has_profile, "Session resolved");
        }
    }

    /// Allocate a sequence number for a newly observed trigger and enter
    /// `phase`. Returns `None` once torn down.
    fn begin(&self, trigger: Trigger, phase: CoordinatorPhase) -> Option<u64> {
        let mut gate = self.gate.lock();
        if self.is_torn_down() {
            return None;
        }
        gate.sequence += 1;
        self.enter(phase);
        self.store.replace(AuthPatch::loading(phase.is_loading()));
        trace!(sequence = gate.sequence, %trigger, %phase, "Trigger observed");
        Some(gate.sequence)
    }

    /// Write `patch` if `sequence` is still the newest trigger.
    fn commit(
        &self,
        sequence: u64,
        trigger: Trigger,
        phase: CoordinatorPhase,
        patch: AuthPatch,
    ) -> bool {
        let gate = self.gate.lock();
        if self.is_torn_down() || gate.sequence != sequence {
            trace!(sequence, latest = gate.sequence, %trigger, "Dropping stale result");
            return false;
        }
        self.enter(phase);
        self.store.replace(patch.with_loading(phase.is_loading()));
        trace!(sequence, %trigger, %phase, "Committed");
        true
    }

    /// Clear session and profile now, superseding in-flight work.
    fn clear(&self, trigger: Trigger) {
        let mut gate = self.gate.lock();
        if self.is_torn_down() {
            return;
        }
        gate.sequence += 1;
        self.enter(CoordinatorPhase::SignedOut);
        self.store.replace(AuthPatch::cleared().with_loading(false));
        debug!(sequence = gate.sequence, %trigger, "Session cleared");
    }

    /// Caller holds the gate.
    fn enter(&self, phase: CoordinatorPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    fn tear_down(&self) {
        let _gate = self.gate.lock();
        self.torn_down.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("phase", &self.phase())
            .field("mounted", &self.mounted.load(Ordering::Acquire))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
