//! Record and collection definitions for the local cache.
//!
//! This module defines the data shapes the sync core moves between the
//! backend and the local store. Records themselves stay untyped JSON
//! ([`Record`]) because the cache never interprets them beyond their `id`.
//! The typed structs here describe what the client *creates*: project
//! drafts, progress notes and photo assets.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Result, SyncError};

/// One domain entity as the backend returns it (a project, a photo
/// reference, a progress note).
pub type Record = JsonValue;

/// Server-assigned identity of a record.
///
/// The backend hands out integers, but identifiers arrive from screens and
/// route parameters as strings too, so both forms are accepted and compared
/// through their textual representation.
///
/// ```rust
/// use field_sync_core::record::RecordId;
/// use serde_json::json;
///
/// let id = RecordId::from(5_i64);
/// assert!(id.matches(&json!({"id": 5, "name": "Bridge"})));
/// assert!(id.matches(&json!({"id": "5"})));
/// assert!(!id.matches(&json!({"name": "no id yet"})));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Numeric(i64),
    Text(String),
}

impl RecordId {
    /// Reads the `id` field of a record, if it carries one.
    pub fn of(record: &Record) -> Option<RecordId> {
        match record.get("id")? {
            JsonValue::Number(n) => n.as_i64().map(RecordId::Numeric),
            JsonValue::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match record.get("id") {
            Some(JsonValue::Number(n)) => n.to_string() == self.to_string(),
            Some(JsonValue::String(s)) => *s == self.to_string(),
            _ => false,
        }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Numeric(n) => write!(f, "{n}"),
            RecordId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Numeric(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

/// Stable store key of one cached collection.
///
/// The key is derived from the record kind and, for per-project
/// collections, the parent project's identifier:
///
/// | Collection | Key |
/// |---|---|
/// | all projects | `projects` |
/// | photos of project 5 | `photos_5` |
/// | progress notes of project 5 | `progress_5` |
///
/// ```rust
/// use field_sync_core::record::{CollectionKey, RecordId};
///
/// assert_eq!(CollectionKey::projects().as_str(), "projects");
/// assert_eq!(CollectionKey::photos(&RecordId::from(5_i64)).as_str(), "photos_5");
/// assert_eq!(CollectionKey::progress(&"7".into()).as_str(), "progress_7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey(String);

impl CollectionKey {
    pub fn projects() -> Self {
        CollectionKey("projects".to_string())
    }

    pub fn photos(project_id: &RecordId) -> Self {
        CollectionKey(format!("photos_{project_id}"))
    }

    pub fn progress(project_id: &RecordId) -> Self {
        CollectionKey(format!("progress_{project_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CollectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionKey {
    fn from(value: &str) -> Self {
        CollectionKey(value.to_string())
    }
}

impl From<String> for CollectionKey {
    fn from(value: String) -> Self {
        CollectionKey(value)
    }
}

impl AsRef<str> for CollectionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Payload for `POST /projects/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProjectDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SyncError::InvalidInput("project name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// A progress note as kept in the local `progress_{id}` collection.
///
/// The backend never returns this shape; it is built on the device once the
/// report has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressNote {
    pub note: String,
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub date: String,
}

impl ProgressNote {
    pub fn now(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            date: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Photo picked on the device, staged in `photos_{id}` before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAsset {
    pub uri: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Binary payload sent as the `file` part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    /// Builds an upload for `asset`, falling back to `photo.jpg` and
    /// `image/jpeg` when the picker did not report a name or type.
    pub fn from_asset(asset: &PhotoAsset, bytes: Vec<u8>) -> Self {
        Self {
            file_name: asset.file_name.clone().unwrap_or_else(|| "photo.jpg".to_string()),
            mime_type: asset.mime_type.clone().unwrap_or_else(|| "image/jpeg".to_string()),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_reads_numeric_and_text_ids() {
        assert_eq!(RecordId::of(&json!({"id": 3})), Some(RecordId::Numeric(3)));
        assert_eq!(RecordId::of(&json!({"id": "a-1"})), Some(RecordId::Text("a-1".into())));
        assert_eq!(RecordId::of(&json!({"id": null})), None);
        assert_eq!(RecordId::of(&json!({"uri": "a.jpg"})), None);
    }

    #[test]
    fn record_id_deserializes_untagged() {
        let ids: Vec<RecordId> = serde_json::from_str(r#"[1, "two"]"#).unwrap();
        assert_eq!(ids, vec![RecordId::Numeric(1), RecordId::Text("two".into())]);
    }

    #[test]
    fn draft_requires_a_name() {
        let draft = ProjectDraft { name: String::new(), description: None };
        assert!(matches!(draft.validate(), Err(SyncError::InvalidInput(_))));
        let draft = ProjectDraft { name: "  ".into(), description: None };
        assert!(draft.validate().is_ok());
        let draft = ProjectDraft { name: "Bridge".into(), description: Some("Deck".into()) };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn progress_note_date_is_utc_millis() {
        let note = ProgressNote::now("poured foundations");
        assert_eq!(note.note, "poured foundations");
        assert!(note.date.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&note.date).is_ok());
    }

    #[test]
    fn photo_asset_uses_picker_field_names() {
        let asset: PhotoAsset =
            serde_json::from_value(json!({"uri": "file:///a.jpg", "type": "image/png", "fileName": "a.png"}))
                .unwrap();
        assert_eq!(asset.mime_type.as_deref(), Some("image/png"));
        let upload = PhotoUpload::from_asset(&asset, vec![1, 2]);
        assert_eq!(upload.file_name, "a.png");

        let bare = PhotoAsset { uri: "a.jpg".into(), mime_type: None, file_name: None };
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!({"uri": "a.jpg"}));
        let upload = PhotoUpload::from_asset(&bare, Vec::new());
        assert_eq!(upload.file_name, "photo.jpg");
        assert_eq!(upload.mime_type, "image/jpeg");
    }
}
