//! Storage error types for the blob store abstraction layer.
//!
//! This module defines all error types that can occur during blob store operations.

use std::fmt;

use erx_core::{BlobName, BlobType};

/// Errors that can occur during blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested blob was not found.
    #[error("Blob not found: {blob_type}/{name}")]
    NotFound {
        /// The type of the blob that was not found.
        blob_type: BlobType,
        /// The name of the blob that was not found.
        name: BlobName,
    },

    /// A uniqueness or referential integrity rule was violated.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The blob data is not self-consistent.
    #[error("Invalid blob: {message}")]
    InvalidBlob {
        /// Description of why the blob is invalid.
        message: String,
    },

    /// Failed to connect to the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(blob_type: BlobType, name: impl Into<BlobName>) -> Self {
        Self::NotFound {
            blob_type,
            name: name.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidBlob` error.
    #[must_use]
    pub fn invalid_blob(message: impl Into<String>) -> Self {
        Self::InvalidBlob {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if the store rejected the input.
    #[must_use]
    pub fn is_invalid_blob(&self) -> bool {
        matches!(self, Self::InvalidBlob { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::InvalidBlob { .. } => ErrorCategory::BadRequest,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and request outcome mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Blob not found.
    NotFound,
    /// Uniqueness or dependency conflict.
    Conflict,
    /// Caller supplied malformed input.
    BadRequest,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error or violated invariant.
    Internal,
}

impl ErrorCategory {
    /// HTTP status code a request failing with this category is answered with.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::BadRequest => 400,
            Self::Infrastructure => 503,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
