use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info};
use serde_json::Value as JsonValue;

use crate::error::{Result, SyncError};
use crate::store::PersistentStore;

/// LMDB-backed snapshot store.
///
/// The environment lives in a `{name}.lmdb` directory. Every `set` runs in
/// its own write transaction, and LMDB syncs a committed transaction to disk
/// before `commit` returns.
pub struct LmdbStore {
    env: Environment,
    db: Database,
    path: PathBuf,
    closed: AtomicBool,
}

impl LmdbStore {
    pub fn init(name: &str, map_size: usize) -> Result<Self> {
        let path = PathBuf::from(format!("{name}.lmdb"));
        std::fs::create_dir_all(&path).map_err(|e| {
            SyncError::IoFailure(format!("Cannot create store directory {}: {e}", path.display()))
        })?;

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(map_size)
            .open(&path)?;
        let db = env.create_db(None, DatabaseFlags::empty())?;

        info!("Opened snapshot store at {}", path.display());
        Ok(Self {
            env,
            db,
            path,
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes pending pages and refuses further operations.
    ///
    /// The LMDB environment itself is released when the store is dropped.
    pub fn close_database(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.env.sync(true)?;
        info!("Closed snapshot store at {}", self.path.display());
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::IoFailure(format!(
                "Snapshot store {} is closed",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(SyncError::IoFailure("Store keys must not be empty".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for LmdbStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        self.ensure_open()?;
        Self::check_key(key)?;

        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    SyncError::DecodeError(format!("Snapshot '{key}' is not UTF-8: {e}"))
                })?;
                Some(serde_json::from_str(text)?)
            }
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &JsonValue) -> Result<()> {
        self.ensure_open()?;
        Self::check_key(key)?;

        let json = serde_json::to_string(value)?;
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &json, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Stored snapshot '{key}' ({} bytes)", json.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, name: &str) -> LmdbStore {
        let name = dir.path().join(name);
        LmdbStore::init(name.to_str().unwrap(), 1024 * 1024).unwrap()
    }

    #[tokio::test]
    async fn missing_key_is_absent_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "absent");
        assert!(store.get("projects").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_returns_same_value() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "roundtrip");
        let value = json!([{"id": 1, "name": "Foo"}, {"id": 2, "name": "Stavba č. 2"}]);

        store.set("projects", &value).await.unwrap();
        assert_eq!(store.get("projects").await.unwrap(), Some(value));
        assert!(store.path().ends_with("roundtrip.lmdb"));
    }

    #[tokio::test]
    async fn set_fully_replaces_previous_value() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "replace");
        store.set("progress_5", &json!([1, 2, 3])).await.unwrap();
        store.set("progress_5", &json!([])).await.unwrap();
        assert_eq!(store.get("progress_5").await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = store_in(&dir, "restart");
            store.set("photos_5", &json!([{"uri": "a.jpg"}])).await.unwrap();
            store.close_database().unwrap();
        }
        let reopened = store_in(&dir, "restart");
        assert_eq!(
            reopened.get("photos_5").await.unwrap(),
            Some(json!([{"uri": "a.jpg"}]))
        );
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "empty_key");
        assert!(matches!(store.get("").await, Err(SyncError::IoFailure(_))));
        assert!(matches!(store.set("", &json!([])).await, Err(SyncError::IoFailure(_))));
    }

    #[tokio::test]
    async fn closed_store_refuses_operations() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "closed");
        store.close_database().unwrap();
        store.close_database().unwrap();
        assert!(matches!(store.get("projects").await, Err(SyncError::IoFailure(_))));
        assert!(matches!(store.set("projects", &json!([])).await, Err(SyncError::IoFailure(_))));
    }

    #[tokio::test]
    async fn writing_one_key_leaves_others_intact() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "isolated");
        store.set("projects", &json!([{"id": 1}])).await.unwrap();
        store.set("photos_1", &json!([{"uri": "a.jpg"}])).await.unwrap();
        store.set("photos_1", &json!([])).await.unwrap();

        assert_eq!(store.get("projects").await.unwrap(), Some(json!([{"id": 1}])));
        assert_eq!(store.get("photos_1").await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn corrupt_bytes_surface_as_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "corrupt");
        {
            let mut txn = store.env.begin_rw_txn().unwrap();
            txn.put(store.db, &"projects", &"{not json", WriteFlags::empty()).unwrap();
            txn.commit().unwrap();
        }
        assert!(matches!(store.get("projects").await, Err(SyncError::DecodeError(_))));
    }
}
