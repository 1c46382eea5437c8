//! # PropDesk Infrastructure
//!
//! Infrastructure implementations of core session ports.
//!
//! This crate contains:
//! - REST adapters for the identity backend and the profile table
//! - In-memory adapters for demos and downstream tests
//! - HTTP client with retry, and error conversions
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `propdesk-core`
//! - Contains all "impure" code (network, environment, files)

pub mod backend;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use backend::{
    AccessTokenProvider, InMemoryIdentityBackend, InMemoryProfileStore, ProfileRow,
    RestIdentityBackend, RestProfileStore,
};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::init_tracing;
