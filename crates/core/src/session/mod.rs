//! Session & profile synchronization
//!
//! Keeps one consistent picture of "who is logged in and what is their
//! profile" while independent triggers race to update it.
//!
//! ```text
//! ┌──────────────────────┐   auth notifications / navigation / focus
//! │  SessionCoordinator  │◄─────────────────────────────────────────
//! └─────────┬────────────┘
//!           ├──► IdentityBackend   (session read, sign-out)
//!           ├──► ProfileFetcher ──► ProfileStore
//!           └──► SessionStore ──► SessionHandle (consumers)
//! ```
//!
//! Every trigger takes a sequence number when it is observed; results are
//! written only if no newer trigger has been observed since. Overlapping
//! triggers therefore converge to the state implied by the most recent one.

pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod handle;
pub mod ports;
pub mod store;

pub use coordinator::{CoordinatorPhase, SessionCoordinator, Trigger};
pub use error::{SessionError, SessionResult};
pub use fetcher::ProfileFetcher;
pub use handle::SessionHandle;
pub use store::{AuthPatch, SessionStore};
