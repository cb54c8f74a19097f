//! Remote backend access.
//!
//! [`RemoteClient`] is the seam between the synchronizer and the network.
//! [`HttpRemoteClient`] is the production implementation; tests substitute
//! their own.

mod http;

pub use http::HttpRemoteClient;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::record::{PhotoUpload, Record};

/// Each call either yields parsed JSON or fails with `NetworkUnreachable`,
/// `ServerError` or `DecodeError`. Nothing is retried, and a failed
/// `create`/`upload` says nothing about whether the backend applied it.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// `GET {base}{path}`, expecting a JSON array.
    async fn list(&self, path: &str) -> Result<Vec<Record>>;

    /// `GET {base}{path}`, expecting a single JSON record.
    async fn fetch(&self, path: &str) -> Result<Record>;

    /// `POST {base}{path}` with a JSON body.
    async fn create(&self, path: &str, payload: &JsonValue) -> Result<Record>;

    /// `POST {base}{path}` as `multipart/form-data` with a `file` part.
    async fn upload(&self, path: &str, upload: PhotoUpload) -> Result<Record>;
}

/// Backend resource paths, relative to the configured base URL.
pub mod api {
    use crate::record::RecordId;

    pub fn projects() -> String {
        "/projects/".to_string()
    }

    pub fn project(id: &RecordId) -> String {
        format!("/projects/{id}")
    }

    pub fn progress(project_id: &RecordId) -> String {
        format!("/projects/{project_id}/progress/")
    }

    pub fn photos(project_id: &RecordId) -> String {
        format!("/projects/{project_id}/photos/")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn paths_match_backend_routes() {
            let id = RecordId::Numeric(5);
            assert_eq!(projects(), "/projects/");
            assert_eq!(project(&id), "/projects/5");
            assert_eq!(progress(&id), "/projects/5/progress/");
            assert_eq!(photos(&RecordId::Text("abc".into())), "/projects/abc/photos/");
        }
    }
}
