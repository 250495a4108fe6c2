//! API module for shared HTTP API functionality
//!
//! Contains ONLY pure functions and shared types (no HTTP framework
//! dependencies). bizval-fn wraps these with axum extractors and responses.

pub mod auth;
pub mod types;

pub use auth::{generate_token, hash_token, parse_bearer, AuthError};
pub use types::{ErrorBody, QueuedResponse};
