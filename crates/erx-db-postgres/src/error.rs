//! Error types for the PostgreSQL blob store.

use erx_storage::StorageError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for unique violations (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for foreign key violations (23503).
pub const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL error code for not-null violations (23502).
pub const PG_NOT_NULL_VIOLATION: &str = "23502";

/// PostgreSQL error code for check constraint violations (23514).
pub const PG_CHECK_VIOLATION: &str = "23514";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Errors specific to the PostgreSQL blob store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Schema bootstrap failed.
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new schema error.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection_error(e.to_string()),
            PostgresError::Schema { message } => {
                StorageError::internal(format!("Schema error: {message}"))
            }
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

/// How a PostgreSQL error code is reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodeClass {
    Conflict,
    InvalidInput,
}

pub(crate) fn classify_pg_code(code: &str) -> Option<CodeClass> {
    match code {
        PG_UNIQUE_VIOLATION | PG_FOREIGN_KEY_VIOLATION => Some(CodeClass::Conflict),
        PG_CHECK_VIOLATION | PG_NOT_NULL_VIOLATION => Some(CodeClass::InvalidInput),
        // Class 22: data exception.
        c if c.starts_with("22") => Some(CodeClass::InvalidInput),
        _ => None,
    }
}

/// Maps a failed statement to the store error taxonomy.
pub(crate) fn statement_error(err: SqlxError, context: &str) -> StorageError {
    if let SqlxError::Database(db_err) = &err
        && let Some(class) = db_err.code().as_deref().and_then(classify_pg_code)
    {
        let message = format!("{context}: {}", db_err.message());
        return match class {
            CodeClass::Conflict => StorageError::conflict(message),
            CodeClass::InvalidInput => StorageError::invalid_blob(message),
        };
    }

    match err {
        SqlxError::Io(_)
        | SqlxError::Tls(_)
        | SqlxError::PoolTimedOut
        | SqlxError::PoolClosed
        | SqlxError::WorkerCrashed => StorageError::connection_error(format!("{context}: {err}")),
        other => StorageError::internal(format!("{context}: {other}")),
    }
}

/// Maps a failed commit. The outcome of the transaction is unknown.
pub(crate) fn commit_error(err: &SqlxError, context: &str) -> StorageError {
    StorageError::internal(format!(
        "{context}: transaction may or may not have been committed: {err}"
    ))
}
