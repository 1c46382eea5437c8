//! Domain types and models

pub mod auth;
pub mod profile;
pub mod session;

pub use auth::{AuthChangeEvent, AuthNotification, AuthState};
pub use profile::{Profile, UserRole};
pub use session::Session;
