//! Cache-versus-network policy.
//!
//! [`Synchronizer`] is the only place that decides whether a read trusts
//! the backend or the local snapshot, and how a locally originated record
//! lands in a snapshot.
//!
//! Reads are two-tier and deterministic: the backend is always asked
//! first. A successful response replaces the snapshot (or, under
//! [`RefreshStrategy::PreserveUnconfirmed`], is followed by the cached
//! entries that never got an `id`). A connectivity failure
//! (`NetworkUnreachable` or `ServerError`) serves the last snapshot as-is, or
//! an empty list when there is none. Decode and storage faults propagate.
//!
//! Appends extend the snapshot without consulting the backend and without
//! deduplication. Every read-modify-write on a key runs under that key's
//! lock, so a refresh and an append on the same key cannot interleave.

mod locks;

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value as JsonValue};

use crate::config::RefreshStrategy;
use crate::error::{Result, SyncError};
use crate::record::{
    CollectionKey, PhotoAsset, PhotoUpload, ProgressNote, ProjectDraft, Record, RecordId,
};
use crate::remote::{api, RemoteClient};
use crate::store::PersistentStore;

use self::locks::KeyLocks;

pub struct Synchronizer {
    store: Arc<dyn PersistentStore>,
    remote: Arc<dyn RemoteClient>,
    strategy: RefreshStrategy,
    locks: KeyLocks,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn PersistentStore>, remote: Arc<dyn RemoteClient>) -> Self {
        Self {
            store,
            remote,
            strategy: RefreshStrategy::default(),
            locks: KeyLocks::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: RefreshStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> RefreshStrategy {
        self.strategy
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    /// Refresh-or-fallback read of one collection.
    ///
    /// Never fails for connectivity reasons; only `DecodeError` and
    /// `IoFailure` reach the caller.
    pub async fn sync_collection(&self, path: &str, key: &str) -> Result<Vec<Record>> {
        match self.remote.list(path).await {
            Ok(remote) => {
                let _guard = self.locks.acquire(key).await;
                let snapshot = match self.strategy {
                    RefreshStrategy::ReplaceAll => remote,
                    RefreshStrategy::PreserveUnconfirmed => {
                        let cached = self.read_snapshot(key).await?;
                        preserve_unconfirmed(remote, cached)
                    }
                };
                self.write_snapshot(key, &snapshot).await?;
                debug!("Refreshed '{key}' from {path}: {} records", snapshot.len());
                Ok(snapshot)
            }
            Err(err) if err.is_connectivity() => {
                warn!("Refresh of '{key}' from {path} failed, serving cached snapshot: {err}");
                self.read_snapshot(key).await
            }
            Err(err) => Err(err),
        }
    }

    /// Appends `record` to the end of the snapshot under `key`.
    ///
    /// An absent snapshot counts as empty. Appending the same record twice
    /// stores it twice.
    pub async fn append_local(&self, key: &str, record: Record) -> Result<()> {
        let _guard = self.locks.acquire(key).await;
        let mut snapshot = self.read_snapshot(key).await?;
        snapshot.push(record);
        self.write_snapshot(key, &snapshot).await?;
        debug!("Appended to '{key}', now {} records", snapshot.len());
        Ok(())
    }

    /// Current snapshot under `key`; empty when nothing was ever stored.
    pub async fn snapshot(&self, key: &str) -> Result<Vec<Record>> {
        self.read_snapshot(key).await
    }

    // -----------------------------------------------------------------------
    // Screen-level flows
    // -----------------------------------------------------------------------

    pub async fn sync_projects(&self) -> Result<Vec<Record>> {
        self.sync_collection(&api::projects(), CollectionKey::projects().as_str())
            .await
    }

    /// Single record from the backend, or from the cached collection under
    /// `cache_key` when the backend is unreachable. Ids are compared as text.
    pub async fn fetch_record(
        &self,
        path: &str,
        cache_key: &str,
        id: &RecordId,
    ) -> Result<Option<Record>> {
        match self.remote.fetch(path).await {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_connectivity() => {
                warn!("Fetching {path} failed, looking up '{id}' in '{cache_key}': {err}");
                let cached = self.read_snapshot(cache_key).await?;
                Ok(cached.into_iter().find(|record| id.matches(record)))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn project_detail(&self, id: &RecordId) -> Result<Option<Record>> {
        self.fetch_record(&api::project(id), CollectionKey::projects().as_str(), id)
            .await
    }

    /// Creates a record remotely, then appends the server's response.
    ///
    /// On failure the snapshot is left untouched and the error is returned.
    pub async fn create_and_append(
        &self,
        path: &str,
        key: &str,
        payload: &JsonValue,
    ) -> Result<Record> {
        let created = self.remote.create(path, payload).await?;
        self.append_local(key, created.clone()).await?;
        Ok(created)
    }

    pub async fn create_project(&self, draft: &ProjectDraft) -> Result<Record> {
        draft.validate()?;
        let payload = serde_json::to_value(draft)?;
        let created = self
            .create_and_append(&api::projects(), CollectionKey::projects().as_str(), &payload)
            .await?;
        info!("Created project {:?}", RecordId::of(&created));
        Ok(created)
    }

    /// Sends a progress report and, once accepted, keeps a dated local copy
    /// under `progress_{id}`.
    pub async fn report_progress(&self, project_id: &RecordId, note: &str) -> Result<ProgressNote> {
        if note.is_empty() {
            return Err(SyncError::InvalidInput("progress note must not be empty".to_string()));
        }
        self.remote
            .create(&api::progress(project_id), &json!({ "notes": note }))
            .await?;

        let local = ProgressNote::now(note);
        self.append_local(
            CollectionKey::progress(project_id).as_str(),
            serde_json::to_value(&local)?,
        )
        .await?;
        Ok(local)
    }

    /// Keeps a picked photo under `photos_{id}` before any upload attempt.
    /// The entry stays even if the upload later fails.
    pub async fn stage_photo(&self, project_id: &RecordId, asset: &PhotoAsset) -> Result<()> {
        self.append_local(
            CollectionKey::photos(project_id).as_str(),
            serde_json::to_value(asset)?,
        )
        .await
    }

    pub async fn upload_photo(&self, project_id: &RecordId, upload: PhotoUpload) -> Result<Record> {
        self.remote.upload(&api::photos(project_id), upload).await
    }

    // -----------------------------------------------------------------------
    // Snapshot encoding
    // -----------------------------------------------------------------------

    async fn read_snapshot(&self, key: &str) -> Result<Vec<Record>> {
        match self.store.get(key).await? {
            None => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => Ok(items),
            Some(_) => Err(SyncError::DecodeError(format!(
                "snapshot '{key}' is not a JSON array"
            ))),
        }
    }

    async fn write_snapshot(&self, key: &str, snapshot: &[Record]) -> Result<()> {
        self.store.set(key, &JsonValue::Array(snapshot.to_vec())).await
    }
}

fn preserve_unconfirmed(mut remote: Vec<Record>, cached: Vec<Record>) -> Vec<Record> {
    remote.extend(
        cached
            .into_iter()
            .filter(|record| !has_id(record)),
    );
    remote
}

/// Any non-null `id` marks a record the backend has confirmed.
fn has_id(record: &Record) -> bool {
    record.get("id").map_or(false, |id| !id.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserve_unconfirmed_keeps_only_id_less_entries() {
        let remote = vec![json!({"id": 1})];
        let cached = vec![json!({"id": 9}), json!({"uri": "a.jpg"}), json!({"note": "n"})];
        assert_eq!(
            preserve_unconfirmed(remote, cached),
            vec![json!({"id": 1}), json!({"uri": "a.jpg"}), json!({"note": "n"})]
        );
    }

    #[test]
    fn preserve_unconfirmed_treats_any_non_null_id_as_confirmed() {
        let remote = vec![json!({"id": 5.0})];
        let cached = vec![
            json!({"id": 5.0}),
            json!({"id": u64::MAX}),
            json!({"id": {"uuid": "a1"}}),
            json!({"id": null, "uri": "b.jpg"}),
        ];
        assert_eq!(
            preserve_unconfirmed(remote, cached),
            vec![json!({"id": 5.0}), json!({"id": null, "uri": "b.jpg"})]
        );
    }
}
