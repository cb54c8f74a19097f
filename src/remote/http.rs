use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value as JsonValue;

use crate::error::{Result, SyncError};
use crate::record::{PhotoUpload, Record};
use crate::remote::RemoteClient;

/// reqwest-backed client for the project-tracking backend.
///
/// The base URL is fixed at construction. No retries are attempted; without
/// an explicit timeout a request waits as long as the transport allows.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: Client,
    base_url: String,
}

impl HttpRemoteClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| SyncError::InvalidConfig(format!("invalid base_url: {e}")))?;
        if parsed.host_str().is_none() {
            return Err(SyncError::InvalidConfig("base_url missing host".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send_json(&self, request: RequestBuilder, url: &str) -> Result<JsonValue> {
        let response = request.send().await.map_err(|e| {
            warn!("Request to {url} failed: {e}");
            SyncError::NetworkUnreachable(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::NetworkUnreachable(format!("reading body failed: {e}")))?;

        if !status.is_success() {
            warn!("{url} answered {status}");
            return Err(SyncError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        debug!("{url} answered {status} ({} bytes)", body.len());
        serde_json::from_str(&body)
            .map_err(|e| SyncError::DecodeError(format!("malformed body from {url}: {e}")))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list(&self, path: &str) -> Result<Vec<Record>> {
        let url = self.url(path);
        match self.send_json(self.client.get(&url), &url).await? {
            JsonValue::Array(items) => Ok(items),
            other => Err(SyncError::DecodeError(format!(
                "expected a JSON array from {url}, got {}",
                json_kind(&other)
            ))),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Record> {
        let url = self.url(path);
        self.send_json(self.client.get(&url), &url).await
    }

    async fn create(&self, path: &str, payload: &JsonValue) -> Result<Record> {
        let url = self.url(path);
        self.send_json(self.client.post(&url).json(payload), &url).await
    }

    async fn upload(&self, path: &str, upload: PhotoUpload) -> Result<Record> {
        let url = self.url(path);
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| SyncError::InvalidInput(format!("invalid MIME type: {e}")))?;
        let form = Form::new().part("file", part);
        self.send_json(self.client.post(&url).multipart(form), &url).await
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::body::Bytes;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_backend() -> SocketAddr {
        let app = Router::new()
            .route(
                "/projects/",
                get(|| async { Json(json!([{"id": 1, "name": "Foo"}])) }).post(
                    |Json(body): Json<JsonValue>| async move {
                        Json(json!({"id": 7, "name": body["name"], "owner_id": 1}))
                    },
                ),
            )
            .route(
                "/projects/:id",
                get(|Path(id): Path<i64>| async move {
                    if id == 1 {
                        Ok(Json(json!({"id": 1, "name": "Foo"})))
                    } else {
                        Err((StatusCode::NOT_FOUND, "Project not found"))
                    }
                }),
            )
            .route(
                "/projects/:id/photos/",
                post(|headers: HeaderMap, body: Bytes| async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let text = String::from_utf8_lossy(&body).to_string();
                    Json(json!({
                        "multipart": content_type.starts_with("multipart/form-data"),
                        "has_file_field": text.contains("name=\"file\""),
                        "has_file_name": text.contains("filename=\"site.jpg\""),
                    }))
                }),
            )
            .route("/broken/", get(|| async { "<html>not json</html>" }))
            .route("/object/", get(|| async { Json(json!({"items": []})) }))
            .route(
                "/failing/",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/slow/",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!([]))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
        addr
    }

    fn client_for(addr: SocketAddr) -> HttpRemoteClient {
        HttpRemoteClient::new(&format!("http://{addr}/"), None).unwrap()
    }

    #[tokio::test]
    async fn list_parses_array() {
        let client = client_for(spawn_backend().await);
        let projects = client.list("/projects/").await.unwrap();
        assert_eq!(projects, vec![json!({"id": 1, "name": "Foo"})]);
    }

    #[tokio::test]
    async fn fetch_and_create() {
        let client = client_for(spawn_backend().await);
        assert_eq!(client.fetch("/projects/1").await.unwrap()["name"], "Foo");

        let created = client
            .create("/projects/", &json!({"name": "Bridge", "description": null}))
            .await
            .unwrap();
        assert_eq!(created["id"], 7);
        assert_eq!(created["name"], "Bridge");
    }

    #[tokio::test]
    async fn non_success_status_is_server_error() {
        let client = client_for(spawn_backend().await);
        match client.list("/failing/").await {
            Err(SyncError::ServerError { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected server error, got {other:?}"),
        }
        assert!(matches!(
            client.fetch("/projects/99").await,
            Err(SyncError::ServerError { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_bodies_are_decode_errors() {
        let client = client_for(spawn_backend().await);
        assert!(matches!(client.list("/broken/").await, Err(SyncError::DecodeError(_))));
        assert!(matches!(client.list("/object/").await, Err(SyncError::DecodeError(_))));
    }

    #[tokio::test]
    async fn refused_connection_is_network_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(addr);
        assert!(matches!(
            client.list("/projects/").await,
            Err(SyncError::NetworkUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn explicit_timeout_is_network_unreachable() {
        let addr = spawn_backend().await;
        let client =
            HttpRemoteClient::new(&format!("http://{addr}"), Some(Duration::from_millis(100)))
                .unwrap();
        assert!(matches!(
            client.list("/slow/").await,
            Err(SyncError::NetworkUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_field() {
        let client = client_for(spawn_backend().await);
        let upload = PhotoUpload {
            file_name: "site.jpg".into(),
            mime_type: "image/jpeg".into(),
            bytes: vec![0xff, 0xd8, 0xff],
        };
        let echoed = client.upload("/projects/5/photos/", upload).await.unwrap();
        assert_eq!(
            echoed,
            json!({"multipart": true, "has_file_field": true, "has_file_name": true})
        );
    }

    #[test]
    fn base_url_is_validated_and_normalized() {
        assert!(matches!(
            HttpRemoteClient::new("nonsense", None),
            Err(SyncError::InvalidConfig(_))
        ));
        let client = HttpRemoteClient::new("http://10.0.2.2:8000/", None).unwrap();
        assert_eq!(client.base_url(), "http://10.0.2.2:8000");
        assert_eq!(client.url("/projects/"), "http://10.0.2.2:8000/projects/");
        assert_eq!(client.url("projects/"), "http://10.0.2.2:8000/projects/");
    }
}
