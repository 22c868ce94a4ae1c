//! Error types for gradebook-core

use thiserror::Error;

/// Main error type for the gradebook-core library
#[derive(Error, Debug)]
pub enum Error {
    /// The backing store could not be opened, read, or written
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),

    /// An operation would break a declared invariant (unique key, foreign key)
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// An operation addressed a row that does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A background worker died without delivering a result
    #[error("background task error: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        // Constraint failures are invariant breaks, not storage outages.
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::IntegrityViolation(err.to_string())
            }
            _ => Error::StorageUnavailable(err),
        }
    }
}

/// Result type alias for gradebook-core
pub type Result<T> = std::result::Result<T, Error>;
