use erx_scheduler::TimerError;
use erx_storage::{ErrorCategory, StorageError};

/// Boxed error returned by blob providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during blob cache operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobCacheError {
    /// The blob does not exist, even after reloading from the store.
    #[error("Blob not found: {what}")]
    NotFound { what: String },

    /// The store rejected or failed the operation.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The store returned data that violates its own guarantees.
    #[error("Blob store data is corrupt: {message}")]
    Corrupted { message: String },

    /// Background refresh was started a second time.
    #[error("background refresh of the blob cache has already been started")]
    RefreshAlreadyStarted,

    /// Background refresh was requested with a zero interval.
    #[error("blob cache refresh interval must be greater than zero")]
    ZeroRefreshInterval,

    /// The attestation key pair is missing and no enrolment is active.
    #[error("attestation key pair is missing and can not be created")]
    AttestationKeyPairUnavailable,

    /// The provider of a new attestation key pair failed.
    #[error("failed to create attestation key pair: {source}")]
    AttestationKeyCreation {
        #[source]
        source: BoxError,
    },

    /// A violated internal invariant.
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// The refresh timer reported an error.
    #[error(transparent)]
    Timer(#[from] TimerError),
}

impl BlobCacheError {
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error, from the cache or the store.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Returns the error category, reusing the store's categories.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Storage(e) => e.category(),
            Self::AttestationKeyPairUnavailable => ErrorCategory::BadRequest,
            Self::Corrupted { .. }
            | Self::RefreshAlreadyStarted
            | Self::ZeroRefreshInterval
            | Self::AttestationKeyCreation { .. }
            | Self::Internal { .. }
            | Self::Timer(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP status code a request failing with this error is answered with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.category().status_code()
    }
}
