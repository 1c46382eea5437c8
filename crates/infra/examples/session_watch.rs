//! Example: Watching session state through a sign-in / expiry / sign-out
//! cycle
//!
//! Runs the coordinator over the in-memory adapters and logs every state
//! transition, which is what a UI binding would subscribe to.
//!
//! Run with: `RUST_LOG=propdesk_core=debug,info cargo run --example session_watch`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use propdesk_core::SessionCoordinator;
use propdesk_domain::{LoggingConfig, Profile, Session, SessionSyncConfig, UserRole};
use propdesk_infra::{init_tracing, InMemoryIdentityBackend, InMemoryProfileStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&LoggingConfig::default()).context("install tracing subscriber")?;

    let identity = Arc::new(InMemoryIdentityBackend::new());
    let profiles = Arc::new(InMemoryProfileStore::with_profiles([Profile {
        id: "mgr-42".into(),
        first_name: "Lerato".into(),
        last_name: "Khumalo".into(),
        role: UserRole::Manager,
        phone: Some("+27 11 555 0142".into()),
        is_verified: true,
        profile_completed: true,
        onboarding_completed: true,
        avatar_url: None,
    }]));

    let coordinator =
        SessionCoordinator::new(identity.clone(), profiles, SessionSyncConfig::default());
    let handle = coordinator.mount().context("mount coordinator")?;

    let mut changes = handle.subscribe();
    let watcher = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            info!(
                authenticated = state.is_authenticated(),
                loading = state.is_loading,
                subject = state.subject_id().unwrap_or("-"),
                user = state.user.as_ref().map(Profile::full_name).as_deref().unwrap_or("-"),
                "auth state changed"
            );
        }
    });

    handle.settled().await;

    identity.sign_in(Session::new("mgr-42", "demo-access-token"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.settled().await;

    identity.expire();
    handle.notify_focus();
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(authenticated = handle.is_authenticated(), "after focus with expired session");

    identity.sign_in(Session::new("mgr-42", "second-token"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.logout().await.context("logout")?;

    handle.unmount();
    drop(handle);
    watcher.abort();
    Ok(())
}
