//! Error handling primitives shared across the engine.
//!
//! Errors stay inside the subsystem: backends and local storage return them,
//! the repository and the stores log them and report plain outcomes upward.

use thiserror::Error;

/// Stable error codes, handy for status reporting and log filtering.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// A patch or payload did not fit the domain value.
    InvalidInput = 1,
    /// Local durable storage could not be read or written.
    Storage = 2,
    /// The remote store could not be reached or answered garbage.
    Transport = 3,
    /// The remote side rejected our credentials.
    Auth = 4,
    /// Requested row or entry does not exist.
    NotFound = 5,
    /// Catch-all for bugs.
    Internal = 6,
}

/// Canonical error type for the engine.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("local storage failure for `{key}`: {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unauthorized: {0}")]
    Auth(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// Result alias used throughout the crate.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn storage(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            key: key.into(),
            source,
        }
    }

    pub fn transport(msg: impl ToString) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Machine parsable error code.
    pub fn code(&self) -> SyncCode {
        match self {
            SyncError::InvalidInput(_) | SyncError::Serde(_) => SyncCode::InvalidInput,
            SyncError::Storage { .. } => SyncCode::Storage,
            SyncError::Transport(_) => SyncCode::Transport,
            SyncError::Auth(_) => SyncCode::Auth,
            SyncError::NotFound(_) => SyncCode::NotFound,
            SyncError::Internal(_) => SyncCode::Internal,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                SyncError::Auth(err.to_string())
            }
            _ => SyncError::Transport(err.to_string()),
        }
    }
}
