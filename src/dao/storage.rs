use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or answered with a server-side failure.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend understood the request and refused it.
    #[error("write rejected: {message}")]
    Rejected { message: String },
    /// The addressed record does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a rejection (validation failure or conflicting write).
    pub fn rejected(message: impl Into<String>) -> Self {
        StorageError::Rejected {
            message: message.into(),
        }
    }

    /// Construct a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        StorageError::NotFound { what: what.into() }
    }

    /// Transport-level failures are worth retrying; rejections are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(StorageError::unavailable("write".into(), io).is_transient());
        assert!(!StorageError::rejected("bad score").is_transient());
        assert!(!StorageError::not_found("match").is_transient());
    }
}
