//! Error types for the Strata metabase
//!
//! Every error surfaced to callers belongs to one of four classes:
//! invalid request, not found, conflict, or internal.

use thiserror::Error;

/// Common result type for metabase operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the metabase
#[derive(Debug, Error)]
pub enum Error {
    // Caller errors
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Lookup errors
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    // Concurrent mutation collisions
    #[error("object already exists: {0}")]
    ObjectAlreadyExists(String),

    #[error("segment already exists: {0}")]
    SegmentAlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // Internal errors
    #[error("disk I/O error: {0}")]
    DiskIo(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error class surfaced to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed caller input, never retried internally
    InvalidRequest,
    /// Referenced object, stream or segment does not exist
    NotFound,
    /// Collision with a concurrent or earlier mutation, safe to retry
    Conflict,
    /// Store or internal failure
    Internal,
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Class of this error
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRequest(_) => ErrorClass::InvalidRequest,
            Self::ObjectNotFound(_) | Self::SegmentNotFound(_) => ErrorClass::NotFound,
            Self::ObjectAlreadyExists(_) | Self::SegmentAlreadyExists(_) | Self::Conflict(_) => {
                ErrorClass::Conflict
            }
            Self::DiskIo(_)
            | Self::Storage(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Caller-facing message
    ///
    /// The class prefix is dropped except for the already-exists variants,
    /// whose payload is only the version or position.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::InvalidRequest(msg)
            | Self::ObjectNotFound(msg)
            | Self::SegmentNotFound(msg)
            | Self::Conflict(msg)
            | Self::Storage(msg)
            | Self::Serialization(msg)
            | Self::Configuration(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::ObjectAlreadyExists(_) | Self::SegmentAlreadyExists(_) => self.to_string(),
            Self::DiskIo(e) => e.to_string(),
        }
    }

    /// Check if the whole operation may be retried by the caller
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Conflict | ErrorClass::Internal
        ) && !matches!(self, Self::Configuration(_) | Self::Serialization(_))
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class(), ErrorClass::NotFound)
    }

    /// Check if this is a conflict error
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.class(), ErrorClass::Conflict)
    }

    /// Check if this is an invalid request error
    #[must_use]
    pub const fn is_invalid_request(&self) -> bool {
        matches!(self.class(), ErrorClass::InvalidRequest)
    }
}
