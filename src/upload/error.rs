use crate::features::error::Rejection;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reasons an upload could not even begin. No session exists when these are returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("Another upload is already in progress")]
    AlreadyActive,

    #[error("No API token set, authenticate before uploading")]
    Unauthenticated,

    #[error("Uploads must be started from within a Tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FailureKind {
    InvalidFile,
    Unauthenticated,
    NetworkFailure,
    RemoteRejected,
    MalformedResponse,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidFile => "Invalid file",
            Self::Unauthenticated => "Unauthenticated",
            Self::NetworkFailure => "Network failure",
            Self::RemoteRejected => "Rejected by server",
            Self::MalformedResponse => "Malformed response",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// How a session ended when it did not produce a location.
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[error("{kind}: {message}")]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SessionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "Upload cancelled")
    }
}

impl From<Rejection> for SessionFailure {
    fn from(rejection: Rejection) -> Self {
        Self::new(FailureKind::InvalidFile, rejection.to_string())
    }
}

/// Failure reported by a [`Transport`](crate::upload::Transport) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Could not reach the upload endpoint: {0}")]
    Connection(String),

    #[error("Transfer interrupted: {0}")]
    Interrupted(String),

    #[error("Upload timed out")]
    Timeout,
}
