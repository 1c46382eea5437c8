//! Consumer-facing handle to a mounted coordinator

use std::sync::Arc;

use propdesk_domain::{AuthState, Profile, Session};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::trace;

use super::coordinator::{Command, CoordinatorPhase, SessionCoordinator};
use super::error::{SessionError, SessionResult};

/// Read and control a mounted [`SessionCoordinator`].
///
/// Cheap to clone. When every handle is dropped the trigger loop stops.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    coordinator: Arc<SessionCoordinator>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub(crate) fn new(
        coordinator: Arc<SessionCoordinator>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self { coordinator, commands }
    }

    /// Complete state snapshot; session and profile are always consistent
    pub fn state(&self) -> AuthState {
        self.coordinator.state()
    }

    pub fn session(&self) -> Option<Session> {
        self.state().session
    }

    pub fn user(&self) -> Option<Profile> {
        self.state().user
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading
    }

    pub fn phase(&self) -> CoordinatorPhase {
        self.coordinator.phase()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.coordinator.store().subscribe()
    }

    /// Wait until no transition is in progress and return that state.
    pub async fn settled(&self) -> AuthState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|state| !state.is_loading).await {
            Ok(state) => state.clone(),
            // The store outlives every receiver; fall back to a snapshot.
            Err(_) => self.state(),
        };
        settled
    }

    /// Sign out. Local state is cleared before the backend answers.
    ///
    /// # Errors
    /// Returns [`SessionError::SignOutFailed`] if the backend rejected the
    /// sign-out; the local state is cleared regardless
    pub async fn logout(&self) -> SessionResult<()> {
        self.coordinator.logout().await
    }

    /// Re-read the session and profile now and wait for the result.
    ///
    /// # Errors
    /// Returns [`SessionError::NotMounted`] if the coordinator has been
    /// unmounted
    pub async fn refresh(&self) -> SessionResult<()> {
        if self.coordinator.is_torn_down() {
            return Err(SessionError::NotMounted);
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.commands
            .send(Command::Refresh(done_tx))
            .map_err(|_| SessionError::NotMounted)?;
        done_rx.await.map_err(|_| SessionError::NotMounted)
    }

    /// Report a route change. Re-reads after the settling delay; bursts of
    /// navigations collapse into one re-read.
    pub fn notify_navigation(&self) {
        self.send(Command::Navigation);
    }

    /// Report that the window regained focus. Re-reads immediately.
    pub fn notify_focus(&self) {
        self.send(Command::Focus);
    }

    /// Stop listening and suppress any in-flight write.
    pub fn unmount(&self) {
        self.coordinator.unmount();
    }

    pub fn is_mounted(&self) -> bool {
        !self.coordinator.is_torn_down() && !self.commands.is_closed()
    }

    fn send(&self, command: Command) {
        if let Err(err) = self.commands.send(command) {
            trace!(command = ?err.0, "Coordinator not running; signal dropped");
        }
    }
}
