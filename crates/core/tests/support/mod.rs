//! Shared test helpers for `propdesk-core` integration tests.
//!
//! Mocks for the identity and profile ports plus a few waiting helpers, so
//! coordinator tests can describe trigger sequences instead of plumbing.

#![allow(dead_code)]

pub mod backends;

use std::future::Future;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use propdesk_core::SessionHandle;
use propdesk_domain::{AuthState, Profile, Session, SessionSyncConfig, UserRole};

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Coordinator timing used by tests: default settle delay, generous
/// profile timeout so held fetches never time out on their own.
pub fn test_config() -> SessionSyncConfig {
    SessionSyncConfig { settle_delay_ms: 100, profile_timeout_ms: 60_000 }
}

pub fn session(subject: &str) -> Session {
    Session::new(subject, format!("access-{subject}"))
        .with_email(format!("{subject}@example.com"))
        .with_validity(
            Some(Utc::now() - ChronoDuration::minutes(5)),
            Some(Utc::now() + ChronoDuration::hours(1)),
        )
}

pub fn expired_session(subject: &str) -> Session {
    Session::new(subject, format!("stale-{subject}")).with_validity(
        Some(Utc::now() - ChronoDuration::hours(2)),
        Some(Utc::now() - ChronoDuration::hours(1)),
    )
}

pub fn profile(id: &str, first_name: &str) -> Profile {
    Profile {
        id: id.to_string(),
        first_name: first_name.to_string(),
        last_name: "Mbeki".to_string(),
        role: UserRole::Manager,
        phone: Some("+27 21 555 0100".to_string()),
        is_verified: true,
        profile_completed: true,
        onboarding_completed: false,
        avatar_url: None,
    }
}

/// Wait until the published state satisfies `predicate`.
pub async fn wait_for_state<F>(handle: &SessionHandle, predicate: F) -> AuthState
where
    F: FnMut(&AuthState) -> bool,
{
    let mut rx = handle.subscribe();
    let state = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for auth state")
        .expect("session store dropped");
    state.clone()
}

/// Poll `condition` until it holds.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

/// Run `future` with the upper bound applied.
pub async fn bounded<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future).await.expect("operation timed out")
}
