//! Assistant session lifecycle.
//!
//! A session binds recent activity to the current device fingerprint. It
//! expires after a period of inactivity and is destroyed outright when the
//! stored fingerprint no longer matches the device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{MentorError, Result};
use crate::security::fingerprint::FingerprintProvider;
use crate::storage::{KeyValueStore, keys};

/// Persisted session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session identifier (UUID format).
    pub id: String,
    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last successful validation.
    pub last_activity: DateTime<Utc>,
    /// Fingerprint of the device the session was created on.
    pub device_fingerprint: String,
}

impl SessionRecord {
    fn new(device_fingerprint: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            last_activity: now,
            device_fingerprint,
        }
    }
}

/// Manages the device-bound assistant session.
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    fingerprints: Arc<FingerprintProvider>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        fingerprints: Arc<FingerprintProvider>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            fingerprints,
            config,
        }
    }

    /// Creates a fresh session bound to the current device and persists it.
    ///
    /// # Returns
    ///
    /// The new session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted.
    pub async fn create_session(&self) -> Result<String> {
        let record = SessionRecord::new(self.fingerprints.fingerprint());
        self.save(&record).await?;
        tracing::debug!(target: "session", "created session {}", record.id);
        Ok(record.id)
    }

    /// Validates the persisted session.
    ///
    /// A session is valid only while its inactivity window is open and its
    /// stored fingerprint matches the current device. An expired or
    /// mismatched session is destroyed as a side effect. Successful
    /// validation refreshes `last_activity`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))`: Session is valid
    /// - `Ok(None)`: No valid session (absent, expired, or rebound)
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn validate_session(&self) -> Result<Option<String>> {
        let Some(raw) = self
            .store
            .get(keys::SESSION)
            .await
            .map_err(|e| MentorError::data_access(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(target: "session", "discarding unreadable session record: {err}");
                self.destroy().await?;
                return Ok(None);
            }
        };

        let now = Utc::now();
        if now - record.last_activity > self.config.timeout() {
            tracing::debug!(target: "session", "session {} expired", record.id);
            self.destroy().await?;
            return Ok(None);
        }

        if record.device_fingerprint != self.fingerprints.fingerprint() {
            tracing::warn!(target: "session", "session {} fingerprint mismatch", record.id);
            self.destroy().await?;
            return Ok(None);
        }

        record.last_activity = now;
        self.save(&record).await?;
        Ok(Some(record.id))
    }

    /// Returns a valid session id, creating a new session if none exists.
    pub async fn ensure_session(&self) -> Result<String> {
        if let Some(id) = self.validate_session().await? {
            return Ok(id);
        }
        self.create_session().await
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.store
            .set(keys::SESSION, &raw)
            .await
            .map_err(|e| MentorError::data_access(e.to_string()))
    }

    async fn destroy(&self) -> Result<()> {
        self.store
            .remove(keys::SESSION)
            .await
            .map_err(|e| MentorError::data_access(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::fingerprint::DeviceProfile;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemStore {
        entries: Mutex<HashMap<String, String>>,
    }

    impl MemStore {
        fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for MemStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn profile(model: &str) -> DeviceProfile {
        DeviceProfile {
            brand: "acme".to_string(),
            model: model.to_string(),
            os_name: "android".to_string(),
            os_version: "14".to_string(),
            app_id: "mentor".to_string(),
            app_version: "0.1.0".to_string(),
        }
    }

    fn manager(store: Arc<MemStore>, model: &str) -> SessionManager {
        SessionManager::new(
            store,
            Arc::new(FingerprintProvider::new(profile(model))),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_fresh_session_is_valid() {
        let store = Arc::new(MemStore::new());
        let manager = manager(store, "slate-11");

        let id = manager.create_session().await.unwrap();
        let validated = manager.validate_session().await.unwrap();
        assert_eq!(validated, Some(id));
    }

    #[tokio::test]
    async fn test_absent_session_is_invalid() {
        let store = Arc::new(MemStore::new());
        let manager = manager(store, "slate-11");
        assert_eq!(manager.validate_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stale_session_is_destroyed() {
        let store = Arc::new(MemStore::new());
        let manager = manager(store.clone(), "slate-11");

        manager.create_session().await.unwrap();

        // age the record past the 30 minute timeout
        let raw = store.get(keys::SESSION).await.unwrap().unwrap();
        let mut record: SessionRecord = serde_json::from_str(&raw).unwrap();
        record.last_activity = Utc::now() - chrono::Duration::minutes(31);
        store
            .set(keys::SESSION, &serde_json::to_string(&record).unwrap())
            .await
            .unwrap();

        assert_eq!(manager.validate_session().await.unwrap(), None);
        assert!(store.get(keys::SESSION).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_destroys_session() {
        let store = Arc::new(MemStore::new());
        let original = manager(store.clone(), "slate-11");
        original.create_session().await.unwrap();

        let other_device = manager(store.clone(), "slate-12");
        assert_eq!(other_device.validate_session().await.unwrap(), None);
        assert!(store.get(keys::SESSION).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validation_refreshes_last_activity() {
        let store = Arc::new(MemStore::new());
        let manager = manager(store.clone(), "slate-11");
        manager.create_session().await.unwrap();

        // push activity close to the boundary, then validate
        let raw = store.get(keys::SESSION).await.unwrap().unwrap();
        let mut record: SessionRecord = serde_json::from_str(&raw).unwrap();
        record.last_activity = Utc::now() - chrono::Duration::minutes(29);
        store
            .set(keys::SESSION, &serde_json::to_string(&record).unwrap())
            .await
            .unwrap();

        assert!(manager.validate_session().await.unwrap().is_some());

        let raw = store.get(keys::SESSION).await.unwrap().unwrap();
        let refreshed: SessionRecord = serde_json::from_str(&raw).unwrap();
        assert!(Utc::now() - refreshed.last_activity < chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_ensure_session_creates_when_missing() {
        let store = Arc::new(MemStore::new());
        let manager = manager(store, "slate-11");

        let id = manager.ensure_session().await.unwrap();
        assert_eq!(manager.ensure_session().await.unwrap(), id);
    }
}
