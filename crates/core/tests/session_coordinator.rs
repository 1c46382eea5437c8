//! Integration tests for the session coordinator
//!
//! Each test mounts a coordinator over the mock ports in `support` and drives
//! it through notifications, navigation/focus signals and logout.

mod support;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use propdesk_core::{
    CoordinatorPhase, IdentityBackend, ProfileStore, SessionCoordinator, SessionError,
    SessionHandle,
};
use propdesk_domain::{AuthChangeEvent, AuthNotification, AuthState};
use support::backends::{MockIdentityBackend, MockProfileStore};
use support::{
    bounded, expired_session, profile, session, test_config, wait_for_state, wait_until,
};

fn mount(
    identity: &Arc<MockIdentityBackend>,
    profiles: &Arc<MockProfileStore>,
) -> (Arc<SessionCoordinator>, SessionHandle) {
    let identity_port: Arc<dyn IdentityBackend> = identity.clone();
    let profile_port: Arc<dyn ProfileStore> = profiles.clone();
    let coordinator = SessionCoordinator::new(identity_port, profile_port, test_config());
    let handle = coordinator.mount().expect("first mount succeeds");
    (coordinator, handle)
}

async fn signed_in_as(
    subject: &str,
) -> (Arc<MockIdentityBackend>, Arc<MockProfileStore>, SessionHandle) {
    let identity = MockIdentityBackend::new(Some(session(subject)));
    let profiles = MockProfileStore::with_profiles([profile(subject, "Amara")]);
    let (_, handle) = mount(&identity, &profiles);
    wait_for_state(&handle, |s| !s.is_loading).await;
    (identity, profiles, handle)
}

/// Record every state published from now on.
fn record(handle: &SessionHandle) -> Arc<Mutex<Vec<AuthState>>> {
    let seen = Arc::new(Mutex::new(vec![handle.state()]));
    let mut rx = handle.subscribe();
    let sink = Arc::clone(&seen);
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            sink.lock().push(rx.borrow_and_update().clone());
        }
    });
    seen
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn bootstrap_with_existing_session_loads_profile() {
    let identity = MockIdentityBackend::new(Some(session("u1")));
    let profiles = MockProfileStore::with_profiles([profile("u1", "Amara")]);
    let (_, handle) = mount(&identity, &profiles);

    let state = wait_for_state(&handle, |s| !s.is_loading).await;

    assert_eq!(state.subject_id(), Some("u1"));
    assert_eq!(state.user.as_ref().map(|p| p.first_name.as_str()), Some("Amara"));
    assert_eq!(handle.phase(), CoordinatorPhase::Idle);
    assert_eq!(identity.get_session_calls(), 1);
    assert_eq!(profiles.calls(), 1);
}

#[tokio::test]
async fn store_is_loading_before_bootstrap_completes() {
    let identity = MockIdentityBackend::new(Some(session("u1")));
    let profiles = MockProfileStore::with_profiles([profile("u1", "Amara")]);
    let gate = profiles.hold("u1");
    let (_, handle) = mount(&identity, &profiles);

    wait_until(|| profiles.calls() == 1).await;
    let state = handle.state();
    assert!(state.is_loading);
    assert!(state.session.is_none(), "session must not appear before its profile");
    assert_eq!(handle.phase(), CoordinatorPhase::Bootstrapping);

    gate.notify_one();
    let state = wait_for_state(&handle, |s| !s.is_loading).await;
    assert!(state.user.is_some());
}

#[tokio::test]
async fn bootstrap_without_session_settles_signed_out() {
    let identity = MockIdentityBackend::signed_out();
    let profiles = MockProfileStore::new();
    let (_, handle) = mount(&identity, &profiles);

    let state = wait_for_state(&handle, |s| !s.is_loading).await;

    assert_eq!(state, AuthState::signed_out());
    assert_eq!(handle.phase(), CoordinatorPhase::SignedOut);
    assert_eq!(profiles.calls(), 0);
}

#[tokio::test]
async fn bootstrap_read_failure_is_treated_as_signed_out() {
    let identity = MockIdentityBackend::new(Some(session("u1")));
    identity.fail_reads(true);
    let profiles = MockProfileStore::with_profiles([profile("u1", "Amara")]);
    let (_, handle) = mount(&identity, &profiles);

    let state = wait_for_state(&handle, |s| !s.is_loading).await;

    assert!(!state.is_authenticated());
    assert!(state.user.is_none());
    assert_eq!(handle.phase(), CoordinatorPhase::SignedOut);
}

#[tokio::test]
async fn bootstrap_with_expired_session_settles_signed_out() {
    let identity = MockIdentityBackend::new(Some(expired_session("u1")));
    let profiles = MockProfileStore::with_profiles([profile("u1", "Amara")]);
    let (_, handle) = mount(&identity, &profiles);

    let state = wait_for_state(&handle, |s| !s.is_loading).await;

    assert_eq!(state, AuthState::signed_out());
    assert_eq!(profiles.calls(), 0);
}

#[tokio::test]
async fn second_mount_is_rejected() {
    let identity = MockIdentityBackend::signed_out();
    let profiles = MockProfileStore::new();
    let (coordinator, _handle) = mount(&identity, &profiles);

    assert!(matches!(coordinator.mount(), Err(SessionError::AlreadyMounted)));
    assert_eq!(identity.subscriber_count(), 1);
}

// ============================================================================
// Auth notifications
// ============================================================================

#[tokio::test]
async fn sign_in_writes_session_and_profile_together() {
    let identity = MockIdentityBackend::signed_out();
    let profiles = MockProfileStore::with_profiles([profile("u1", "Amara")]);
    let (_, handle) = mount(&identity, &profiles);
    wait_for_state(&handle, |s| !s.is_loading).await;
    let seen = record(&handle);

    identity.emit(AuthNotification::signed_in(session("u1")));
    let state = wait_for_state(&handle, |s| s.user.is_some() && !s.is_loading).await;

    assert_eq!(state.subject_id(), Some("u1"));
    assert_eq!(handle.phase(), CoordinatorPhase::Idle);
    for observed in seen.lock().iter() {
        if observed.session.is_some() {
            assert!(observed.user.is_some(), "session published without its profile");
        }
    }
}

#[tokio::test]
async fn sign_in_without_profile_row_converges_to_pending_profile() {
    let identity = MockIdentityBackend::signed_out();
    let profiles = MockProfileStore::new();
    let (_, handle) = mount(&identity, &profiles);
    wait_for_state(&handle, |s| !s.is_loading).await;

    identity.emit(AuthNotification::signed_in(session("newcomer")));
    let state = wait_for_state(&handle, |s| s.is_authenticated() && !s.is_loading).await;

    assert!(state.is_profile_pending());
    assert_eq!(handle.phase(), CoordinatorPhase::Idle);
}

#[tokio::test]
async fn stale_profile_is_discarded_when_another_user_signs_in() {
    let identity = MockIdentityBackend::signed_out();
    let profiles =
        MockProfileStore::with_profiles([profile("alice", "Alice"), profile("bob", "Bob")]);
    let (_, handle) = mount(&identity, &profiles);
    wait_for_state(&handle, |s| !s.is_loading).await;

    let alice_gate = profiles.hold("alice");
    identity.emit(AuthNotification::signed_in(session("alice")));
    wait_until(|| profiles.calls() == 1).await;

    identity.emit(AuthNotification::signed_in(session("bob")));
    wait_for_state(&handle, |s| s.user.is_some() && !s.is_loading).await;

    alice_gate.notify_one();
    wait_until(|| profiles.completed() == 2).await;
    tokio::task::yield_now().await;

    let state = handle.state();
    assert_eq!(state.subject_id(), Some("bob"));
    assert_eq!(state.user.map(|p| p.first_name), Some("Bob".to_string()));
}

#[tokio::test]
async fn sign_out_during_profile_fetch_wins() {
    let identity = MockIdentityBackend::signed_out();
    let profiles = MockProfileStore::with_profiles([profile("alice", "Alice")]);
    let (_, handle) = mount(&identity, &profiles);
    wait_for_state(&handle, |s| !s.is_loading).await;

    let gate = profiles.hold("alice");
    identity.emit(AuthNotification::signed_in(session("alice")));
    wait_until(|| profiles.calls() == 1).await;

    identity.emit(AuthNotification::signed_out());
    wait_for_state(&handle, |s| !s.is_loading).await;

    gate.notify_one();
    wait_until(|| profiles.completed() == 1).await;
    tokio::task::yield_now().await;

    assert_eq!(handle.state(), AuthState::signed_out());
    assert_eq!(handle.phase(), CoordinatorPhase::SignedOut);
}

#[tokio::test]
async fn signed_out_notification_clears_immediately() {
    let (identity, profiles, handle) = signed_in_as("u1").await;
    let profile_reads = profiles.calls();

    identity.emit(AuthNotification::signed_out());
    let state = wait_for_state(&handle, |s| s.session.is_none()).await;

    assert!(state.user.is_none());
    assert!(!state.is_loading);
    assert_eq!(profiles.calls(), profile_reads, "sign-out must not fetch");
}

#[tokio::test]
async fn token_refresh_replaces_session_and_keeps_profile() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    let refreshed = session("u1").with_refresh_token("rotated");
    identity.emit(AuthNotification::token_refreshed(refreshed.clone()));
    let state = wait_for_state(&handle, |s| {
        s.session.as_ref().and_then(|x| x.refresh_token.as_deref()) == Some("rotated")
            && !s.is_loading
    })
    .await;

    assert_eq!(state.session, Some(refreshed));
    assert!(state.user.is_some());
}

#[tokio::test]
async fn expired_session_in_notification_clears_state() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    identity.emit(AuthNotification::new(
        AuthChangeEvent::TokenRefreshed,
        Some(expired_session("u1")),
    ));
    let state = wait_for_state(&handle, |s| s.session.is_none()).await;

    assert_eq!(state, AuthState::signed_out());
}

#[tokio::test]
async fn notification_without_session_is_ignored() {
    let (identity, profiles, handle) = signed_in_as("u1").await;
    let before = handle.state();

    identity.emit(AuthNotification::new(AuthChangeEvent::UserUpdated, None));
    // A later focus re-read proves the loop processed the earlier notification.
    handle.notify_focus();
    wait_until(|| identity.get_session_calls() == 2).await;
    let after = wait_for_state(&handle, |s| !s.is_loading).await;

    assert_eq!(after, before);
    assert_eq!(profiles.calls(), 2);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn logout_clears_before_backend_answers() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;
    let gate = identity.hold_sign_out();

    let logout = tokio::spawn({
        let handle = handle.clone();
        async move { handle.logout().await }
    });

    let state = wait_for_state(&handle, |s| s.session.is_none()).await;
    assert!(state.user.is_none());
    assert!(!state.is_loading);
    assert!(!logout.is_finished());

    gate.notify_one();
    assert!(bounded(logout).await.expect("logout task").is_ok());
    assert_eq!(identity.sign_out_calls(), 1);
}

#[tokio::test]
async fn concurrent_logouts_both_succeed() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    let (first, second) = tokio::join!(handle.logout(), handle.logout());

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(identity.sign_out_calls(), 2);
    assert_eq!(handle.state(), AuthState::signed_out());
}

#[tokio::test]
async fn failed_sign_out_still_clears_local_state() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;
    identity.fail_sign_out(true);

    let err = handle.logout().await.expect_err("backend rejected sign-out");

    assert!(matches!(err, SessionError::SignOutFailed(_)));
    assert_eq!(handle.state(), AuthState::signed_out());
    assert_eq!(handle.phase(), CoordinatorPhase::SignedOut);
}

// ============================================================================
// Focus, navigation and manual refresh
// ============================================================================

#[tokio::test]
async fn focus_with_expired_session_clears_state() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    identity.set_session(Some(expired_session("u1")));
    handle.notify_focus();
    let state = wait_for_state(&handle, |s| s.session.is_none() && !s.is_loading).await;

    assert!(state.user.is_none());
    assert_eq!(handle.phase(), CoordinatorPhase::SignedOut);
}

#[tokio::test]
async fn focus_with_no_session_clears_state() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    identity.set_session(None);
    handle.notify_focus();
    let state = wait_for_state(&handle, |s| s.session.is_none() && !s.is_loading).await;

    assert_eq!(state, AuthState::signed_out());
}

#[tokio::test]
async fn focus_read_failure_keeps_current_state() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;
    let before = handle.state();

    identity.fail_reads(true);
    handle.notify_focus();
    wait_until(|| identity.get_session_calls() == 2).await;
    let after = wait_for_state(&handle, |s| !s.is_loading).await;

    assert_eq!(after, before);
    assert_eq!(handle.phase(), CoordinatorPhase::Idle);
}

#[tokio::test]
async fn profile_failure_then_focus_repopulates() {
    let identity = MockIdentityBackend::signed_out();
    let profiles = MockProfileStore::with_profiles([profile("u1", "Amara")]);
    let (_, handle) = mount(&identity, &profiles);
    wait_for_state(&handle, |s| !s.is_loading).await;

    profiles.fail(true);
    identity.set_session(Some(session("u1")));
    identity.emit(AuthNotification::signed_in(session("u1")));
    let state = wait_for_state(&handle, |s| s.is_authenticated() && !s.is_loading).await;
    assert!(state.is_profile_pending());

    profiles.fail(false);
    handle.notify_focus();
    let state = wait_for_state(&handle, |s| s.user.is_some() && !s.is_loading).await;
    assert_eq!(state.subject_id(), Some("u1"));
}

#[tokio::test]
async fn manual_refresh_picks_up_profile_changes() {
    let (_identity, profiles, handle) = signed_in_as("u1").await;

    let mut updated = profile("u1", "Amara");
    updated.onboarding_completed = true;
    profiles.upsert(updated);

    bounded(handle.refresh()).await.expect("refresh while mounted");

    let state = handle.state();
    assert!(state.user.is_some_and(|p| p.onboarding_completed));
    assert!(!state.is_loading);
}

#[tokio::test(start_paused = true)]
async fn focus_rereads_without_settle_delay() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;
    let started = tokio::time::Instant::now();

    handle.notify_focus();
    wait_until(|| identity.get_session_calls() == 2).await;

    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn navigation_waits_for_settle_delay() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    handle.notify_navigation();
    tokio::time::sleep(Duration::from_millis(90)).await;
    assert_eq!(identity.get_session_calls(), 1);

    wait_until(|| identity.get_session_calls() == 2).await;
    wait_for_state(&handle, |s| !s.is_loading).await;
    assert!(handle.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn navigation_bursts_coalesce_into_one_read() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    handle.notify_navigation();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.notify_navigation();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(identity.get_session_calls(), 1, "deadline resets on each navigation");

    wait_until(|| identity.get_session_calls() == 2).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(identity.get_session_calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn phase_is_readable_inside_state_predicates_while_transitions_race() {
    let (_identity, _profiles, handle) = signed_in_as("u1").await;

    let writer = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for _ in 0..2_000 {
                handle.notify_focus();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut rx = handle.subscribe();
    for _ in 0..2_000 {
        bounded(rx.wait_for(|state| {
            // Phase and mount status are read while the watch borrow is held.
            let phase = handle.phase();
            handle.is_mounted() && (state.is_loading || phase != CoordinatorPhase::Bootstrapping)
        }))
        .await
        .expect("session store dropped");
        tokio::task::yield_now().await;
    }

    bounded(writer).await.expect("focus writer panicked");
    let state = wait_for_state(&handle, |s| !s.is_loading).await;
    assert!(state.is_authenticated());
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn unmount_suppresses_in_flight_write() {
    let identity = MockIdentityBackend::new(Some(session("u1")));
    let profiles = MockProfileStore::with_profiles([profile("u1", "Amara")]);
    let gate = profiles.hold("u1");
    let (coordinator, handle) = mount(&identity, &profiles);
    wait_until(|| profiles.calls() == 1).await;

    handle.unmount();
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(handle.state(), AuthState::initial());
    assert!(!handle.is_mounted());
    assert!(matches!(handle.refresh().await, Err(SessionError::NotMounted)));
    assert!(matches!(coordinator.mount(), Err(SessionError::AlreadyMounted)));
    wait_until(|| identity.subscriber_count() == 0).await;
}

#[tokio::test]
async fn notifications_after_unmount_are_ignored() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;

    handle.unmount();
    identity.emit(AuthNotification::signed_out());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(handle.is_authenticated());
}

#[tokio::test]
async fn dropping_every_handle_releases_subscription() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;
    assert_eq!(identity.subscriber_count(), 1);

    drop(handle);
    wait_until(|| identity.subscriber_count() == 0).await;
}

#[tokio::test]
async fn authentication_is_derived_from_session() {
    let (identity, _profiles, handle) = signed_in_as("u1").await;
    assert!(handle.is_authenticated());
    assert_eq!(handle.session().map(|s| s.subject_id), Some("u1".to_string()));
    assert!(handle.user().is_some_and(|p| p.is_manager()));

    identity.emit(AuthNotification::signed_out());
    wait_for_state(&handle, |s| s.session.is_none()).await;
    assert!(!handle.is_authenticated());
    assert!(handle.user().is_none());
    assert!(!handle.is_loading());
}
