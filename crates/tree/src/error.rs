//! Tree Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Storage client failures are raised
//! as [`ErrorKind::Remote`], keeping the client's own error as a child frame.

use derive_more::{Display, Error};
use drivepath_storage::NodeId;
use drivepath_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};

/// A tree error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies why a path-level operation failed.
///
/// ### Addressing Errors
/// - [`ErrorKind::NotFound`], [`ErrorKind::Ambiguous`], [`ErrorKind::InvalidPath`]
/// - [`ErrorKind::NotAFolder`], [`ErrorKind::NotAFile`]
///
/// ### Operational Errors
/// - [`ErrorKind::NotEmpty`], [`ErrorKind::TooDeep`], [`ErrorKind::InvalidMove`]
/// - [`ErrorKind::PartialMove`], [`ErrorKind::Unsupported`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Remote`], [`ErrorKind::Io`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A path segment has no matching child. `path` is the full path as given.
    #[display("cannot find '{segment}' in path '{path}'")]
    NotFound { segment: String, path: String },
    /// More than one sibling shares the segment's name (strict sibling policy only).
    #[display("'{segment}' in path '{path}' matches {count} items")]
    Ambiguous { segment: String, path: String, count: usize },
    /// Non-recursive delete of a folder that still has children.
    #[display("folder is not empty: {_0}")]
    NotEmpty(#[error(not(source))] NodeId),
    /// The new parent was added but the old parents could not be removed; the
    /// node is now reachable from both.
    #[display("node {node} was added to {added} but could not be removed from its previous parents")]
    PartialMove { node: NodeId, added: NodeId },
    /// Virtual document type with no export mapping.
    #[display("unsupported document type: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// Any failure reported by the storage client, message passed through.
    #[display("remote failure: {message}")]
    Remote { message: String, retryable: bool },
    /// Recursive delete reached the configured depth limit.
    #[display("folder hierarchy too deep below {_0}")]
    TooDeep(#[error(not(source))] NodeId),
    #[display("not a folder: {_0}")]
    NotAFolder(#[error(not(source))] String),
    #[display("not a file: {_0}")]
    NotAFile(#[error(not(source))] String),
    /// A node cannot become its own parent.
    #[display("cannot move {_0} into itself")]
    InvalidMove(#[error(not(source))] NodeId),
    /// The path cannot be used for this operation (e.g. deleting the root).
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Unknown sibling policy name.
    #[display("unknown sibling policy: {_0}")]
    UnknownPolicy(#[error(not(source))] String),
    /// Local filesystem failure while fetching.
    #[display("local I/O error: {_0}")]
    Io(#[error(not(source))] String),
}

impl ErrorKind {
    /// Raise a storage client error as a [`Remote`](Self::Remote) failure,
    /// preserving the client's `Exn` frame as a child in the error tree.
    #[track_caller]
    pub fn remote(err: StorageError) -> Error {
        let inner: &StorageErrorKind = &err;
        let kind = ErrorKind::Remote {
            message: inner.to_string(),
            retryable: inner.is_retryable(),
        };
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote { retryable: true, .. } | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        let err = ErrorKind::NotFound {
            segment: "missing".to_string(),
            path: "/a/missing/b".to_string(),
        };
        assert_eq!(err.to_string(), "cannot find 'missing' in path '/a/missing/b'");
        assert_eq!(ErrorKind::NotEmpty(NodeId::from("f")).to_string(), "folder is not empty: f");
    }

    #[test]
    fn remote_keeps_message() {
        let storage: StorageError = exn::Exn::from(StorageErrorKind::RateLimited);
        let err = ErrorKind::remote(storage);
        assert!(matches!(&*err, ErrorKind::Remote { message, retryable: true } if message == "rate limited by provider"));
        assert!(err.is_retryable());
    }
}
