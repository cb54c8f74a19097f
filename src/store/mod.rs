//! Durable key-value storage for collection snapshots.
//!
//! Keys are collection keys (`projects`, `photos_{id}`, `progress_{id}`),
//! values are arbitrary JSON. A `set` replaces whatever the key held before.
//! There are no multi-key transactions and no locking at this layer; the
//! [`crate::sync::Synchronizer`] serializes access per key.
//!
//! # Implementations
//!
//! - [`LmdbStore`]: on-disk LMDB environment, survives process restarts
//! - [`MemoryStore`]: volatile map for tests and throwaway sessions

mod lmdb_store;
mod memory;

pub use lmdb_store::LmdbStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::Result;

#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// A missing key is `Ok(None)`, never an error. Fails with
    /// `IoFailure` when the medium cannot be read and `DecodeError` when the
    /// stored bytes are not JSON.
    async fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Stores `value` under `key`, replacing any prior value.
    ///
    /// Once this returns `Ok`, the value survives an immediate restart.
    async fn set(&self, key: &str, value: &JsonValue) -> Result<()>;
}
