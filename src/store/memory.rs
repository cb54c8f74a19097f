use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::store::PersistentStore;

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &JsonValue) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_replaces_prior_value() {
        let store = MemoryStore::new();
        assert!(store.get("projects").await.unwrap().is_none());

        store.set("projects", &json!([{"id": 1}])).await.unwrap();
        store.set("projects", &json!([{"id": 2}])).await.unwrap();

        assert_eq!(store.get("projects").await.unwrap(), Some(json!([{"id": 2}])));
        assert_eq!(store.len(), 1);
    }
}
