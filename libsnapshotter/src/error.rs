//! Snapshotter connection error types.
//!
//! All errors in the `libsnapshotter` crate are represented by the
//! [`CsiError`] enum, which derives [`thiserror::Error`].  Transport and
//! driver failures keep the original [`tonic::Status`] untouched; problems
//! detected locally (empty driver name, missing entries, bad timestamps,
//! missing volume handle) get their own variants so callers never have to
//! parse status messages.

use thiserror::Error;
use tonic::Code;

use crate::timestamp::TimestampError;

/// Unified error type for snapshotter connection operations.
#[derive(Debug, Error, Clone)]
pub enum CsiError {
    /// The endpoint address could not be turned into a dialable target.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// Address as supplied by the caller.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The channel was released with `close()`.
    #[error("channel closed")]
    ChannelClosed,

    /// The remote call failed, either in transport or on the driver side.
    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),

    /// The caller's deadline expired before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// `GetPluginInfo` succeeded but reported no name.
    #[error("driver name is empty")]
    EmptyDriverName,

    /// `ListSnapshots` returned no entry for the requested id.
    #[error("can not find snapshot for snapshotID {0}")]
    SnapshotNotFound(String),

    /// A response was missing a required field.
    #[error("malformed {method} response: {reason}")]
    MalformedResponse {
        /// Remote method that produced the response.
        method: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A timestamp in the response could not be normalized.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] TimestampError),

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

/// Coarse classification of a [`CsiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The driver could not be reached.
    Unreachable,
    /// The driver answered with a failure status.
    Rejected,
    /// The driver answered, but the response was unusable.
    MalformedResponse,
    /// A local precondition failed before anything was sent.
    Precondition,
    /// The caller's deadline expired.
    DeadlineExceeded,
    /// The caller cancelled the call.
    Cancelled,
    /// The channel has been closed.
    Closed,
    /// Bad configuration or endpoint.
    Config,
}

impl CsiError {
    /// Create a [`CsiError::MalformedResponse`] for `method`.
    pub fn malformed(method: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            method,
            reason: reason.into(),
        }
    }

    /// Create a [`CsiError::InvalidEndpoint`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn invalid_endpoint<E: std::fmt::Display>(endpoint: &str, e: E) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            reason: e.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rpc(status) => match status.code() {
                Code::Unavailable => ErrorKind::Unreachable,
                Code::DeadlineExceeded => ErrorKind::DeadlineExceeded,
                Code::Cancelled => ErrorKind::Cancelled,
                _ => ErrorKind::Rejected,
            },
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ChannelClosed => ErrorKind::Closed,
            Self::EmptyDriverName
            | Self::SnapshotNotFound(_)
            | Self::MalformedResponse { .. }
            | Self::InvalidTimestamp(_) => ErrorKind::MalformedResponse,
            Self::InvalidArgument(_) => ErrorKind::Precondition,
            Self::InvalidEndpoint { .. } | Self::Config(_) => ErrorKind::Config,
        }
    }

    /// The gRPC status, when the failure came from the transport or driver.
    pub fn status(&self) -> Option<&tonic::Status> {
        match self {
            Self::Rpc(status) => Some(status),
            _ => None,
        }
    }
}
