//! Error taxonomy shared by the store, the remote client and the synchronizer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No connection, DNS failure or timeout before a response arrived.
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The backend answered with a non-2xx status.
    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    /// A response body or a stored value could not be decoded.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The storage medium failed (unreadable, full, permission denied).
    #[error("IO failure: {0}")]
    IoFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    /// Failures that a refresh converts into a fallback read.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkUnreachable(_) | SyncError::ServerError { .. }
        )
    }
}

impl From<lmdb::Error> for SyncError {
    fn from(err: lmdb::Error) -> Self {
        match err {
            lmdb::Error::Corrupted => {
                SyncError::IoFailure("Database is corrupted".to_string())
            }
            lmdb::Error::MapFull => SyncError::IoFailure("Storage map is full".to_string()),
            lmdb::Error::Other(code) => {
                SyncError::IoFailure(format!("LMDB system error code {code}"))
            }
            _ => SyncError::IoFailure(format!("LMDB error: {err}")),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::DecodeError(format!("JSON error: {err}"))
    }
}
