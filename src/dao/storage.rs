use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by score stores regardless of the underlying database.
///
/// Callers surface it as a retry affordance; the service never retries on its own.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached (network, connection pool, timeouts).
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The store answered but refused the operation (authorization, quota, bad document).
    #[error("storage rejected the operation: {message}")]
    Rejected {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a rejection error from any backend failure.
    pub fn rejected(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Rejected {
            message,
            source: Box::new(source),
        }
    }
}
