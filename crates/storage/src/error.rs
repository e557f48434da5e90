//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::node::NodeId;
use derive_more::{Display, Error};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No node with this id exists (or it is not visible to the credentials).
    #[display("node not found: {_0}")]
    NotFound(#[error(not(source))] NodeId),
    /// Access denied (permissions, expired or missing credentials).
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] NodeId),
    /// The provider asked us to slow down.
    #[display("rate limited by provider")]
    RateLimited,
    /// Transport-level failure, or the provider had a bad day (5xx).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The provider rejected the request; the message is passed through as-is.
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
    /// The provider answered, but not with anything we could understand.
    #[display("invalid response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// Fault deliberately injected by a test client.
    #[display("injected failure: {_0}")]
    Injected(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Network(_))
    }
}
