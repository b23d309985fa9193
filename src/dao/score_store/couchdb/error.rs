//! Error types of the CouchDB score store.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed.
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Decoding a JSON value into the expected model failed.
    #[error("failed to deserialize CouchDB value for `{path}`")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// A score document id does not follow `score::{match}::{player}::{hole}`.
    #[error("invalid document ID `{doc_id}`: {kind}")]
    InvalidDocId { doc_id: String, kind: &'static str },
}

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        let status = match &err {
            CouchDaoError::RequestStatus { status, .. } => Some(*status),
            _ => None,
        };
        match status {
            Some(StatusCode::NOT_FOUND) => StorageError::not_found(err.to_string()),
            // Conflicts and other client errors will fail again on retry.
            Some(status) if status.is_client_error() => StorageError::rejected(err.to_string()),
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: StatusCode) -> CouchDaoError {
        CouchDaoError::RequestStatus {
            path: "score::x".into(),
            status: code,
        }
    }

    #[test]
    fn conflicts_are_rejections() {
        let err: StorageError = status(StatusCode::CONFLICT).into();
        assert!(matches!(err, StorageError::Rejected { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err: StorageError = status(StatusCode::SERVICE_UNAVAILABLE).into();
        assert!(err.is_transient());
    }

    #[test]
    fn missing_documents_map_to_not_found() {
        let err: StorageError = status(StatusCode::NOT_FOUND).into();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
