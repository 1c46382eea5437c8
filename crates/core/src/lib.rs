//! # PropDesk Core
//!
//! Pure session-synchronization logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the identity backend and profile store (traits)
//! - The session store, profile fetcher and event coordinator
//! - The consumer-facing session handle
//!
//! ## Architecture Principles
//! - Only depends on `propdesk-domain`
//! - No HTTP or platform code
//! - All external dependencies via traits

pub mod session;

pub use session::ports::{broadcast_subscription, AuthSubscription, IdentityBackend, ProfileStore};
pub use session::{
    AuthPatch, CoordinatorPhase, ProfileFetcher, SessionCoordinator, SessionError, SessionHandle,
    SessionResult, SessionStore, Trigger,
};
