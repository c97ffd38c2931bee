//! Durable key-value store contract.
//!
//! The assistant treats durable storage as an opaque, async key-value
//! store of JSON text values. Concrete backends live in
//! `mentor-infrastructure`; the pipeline only ever talks to this trait so
//! tests can substitute in-memory or failing stores.

use anyhow::Result;
use async_trait::async_trait;

/// An abstract durable key-value store.
///
/// Values are JSON-encoded text. Implementations should treat a missing
/// key as `Ok(None)` rather than an error, and `remove` of a missing key
/// as a successful no-op.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: Key present
    /// - `Ok(None)`: Key absent
    /// - `Err(_)`: Storage access failed
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes the value stored under `key`.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Well-known storage keys used by the pipeline.
pub mod keys {
    /// Persisted conversation log.
    pub const CHAT_HISTORY: &str = "chat_history";

    /// Persisted assistant session record.
    pub const SESSION: &str = "assistant_session";

    /// Per-device rate-limit window, namespaced by device fingerprint.
    pub fn rate_limit(fingerprint: &str) -> String {
        format!("rate_limit:{fingerprint}")
    }
}
