use thiserror::Error;

/// Core error types for blob model operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown blob type code: {0}")]
    UnknownBlobTypeCode(i16),

    #[error("Unknown blob type: {0}")]
    UnknownBlobType(String),

    #[error("Invalid platform state: {0}")]
    InvalidPlatformState(String),

    #[error("Invalid blob id: {0}")]
    InvalidBlobId(String),

    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new UnknownBlobType error
    pub fn unknown_blob_type(name: impl Into<String>) -> Self {
        Self::UnknownBlobType(name.into())
    }

    /// Create a new InvalidPlatformState error
    pub fn invalid_platform_state(message: impl Into<String>) -> Self {
        Self::InvalidPlatformState(message.into())
    }

    /// Create a new InvalidBlobId error
    pub fn invalid_blob_id(value: impl Into<String>) -> Self {
        Self::InvalidBlobId(value.into())
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
