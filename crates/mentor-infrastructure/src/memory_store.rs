//! In-memory key-value store.

use anyhow::Result;
use async_trait::async_trait;
use mentor_core::storage::KeyValueStore;
use std::collections::HashMap;
use std::sync::Mutex;

/// A `KeyValueStore` backed by a process-local map.
///
/// Contents are lost when the process exits. Intended for tests and for
/// callers that explicitly opt out of durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();

        assert!(store.get("missing").await.unwrap().is_none());

        store.set("key", "value").await.unwrap();
        assert_eq!(store.get("key").await.unwrap().as_deref(), Some("value"));

        store.set("key", "replaced").await.unwrap();
        assert_eq!(store.get("key").await.unwrap().as_deref(), Some("replaced"));

        store.remove("key").await.unwrap();
        assert!(store.get("key").await.unwrap().is_none());

        // removing a missing key is a no-op
        store.remove("key").await.unwrap();
    }
}
