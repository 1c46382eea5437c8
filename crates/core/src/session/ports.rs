//! Port interfaces for session synchronization
//!
//! These traits define the boundaries between the coordinator and the
//! identity/profile backend implementations.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use propdesk_domain::{AuthNotification, Profile, Result, Session};
use tokio::sync::broadcast;
use tracing::warn;

/// Stream of auth-state notifications. Dropping it unsubscribes.
pub type AuthSubscription = BoxStream<'static, AuthNotification>;

/// Trait for identity backend operations
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Read the current session, `None` when signed out
    ///
    /// # Errors
    /// Returns error on transient backend or transport failure
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Subscribe to sign-in, sign-out and token-refresh notifications
    fn on_auth_state_change(&self) -> AuthSubscription;

    /// Sign the current user out
    ///
    /// # Errors
    /// Returns error if the backend rejects the sign-out
    async fn sign_out(&self) -> Result<()>;
}

/// Trait for profile retrieval
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get the profile row for a session subject, `None` if no row exists
    async fn get_profile(&self, subject_id: &str) -> Result<Option<Profile>>;
}

/// Adapt a broadcast receiver into an [`AuthSubscription`].
///
/// Lagged receivers skip the missed notifications; the stream ends when the
/// sender is dropped.
pub fn broadcast_subscription(receiver: broadcast::Receiver<AuthNotification>) -> AuthSubscription {
    stream::unfold(receiver, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => return Some((notification, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth subscription lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
