use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::error::SyncError;

/// Envelope returned by every FFI call, serialized as JSON.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum AppResponse {
    NetworkError(String),
    ServerError(String),
    DatabaseError(String),
    SerializationError(String),
    NotFound(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AppResponse::ServerError(msg) => write!(f, "Server error: {}", msg),
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<SyncError> for AppResponse {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NetworkUnreachable(msg) => AppResponse::NetworkError(msg),
            SyncError::ServerError { status, body } => {
                AppResponse::ServerError(format!("status {status}: {body}"))
            }
            SyncError::DecodeError(msg) => AppResponse::SerializationError(msg),
            SyncError::IoFailure(msg) => AppResponse::DatabaseError(msg),
            SyncError::InvalidConfig(msg) | SyncError::InvalidInput(msg) => {
                AppResponse::BadRequest(msg)
            }
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }
}
