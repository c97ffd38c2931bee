//! Debounced conversation persistence.
//!
//! Mutations arrive in bursts (one per streamed fragment); the persister
//! coalesces them into a single write after a quiet period. The debounce
//! is a single-slot trailing timer: each mutation cancels any pending
//! write and schedules a new one.

use mentor_core::message::ChatMessage;
use mentor_core::storage::{KeyValueStore, keys};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Persists conversation snapshots to the durable store on a trailing
/// debounce.
pub struct HistoryPersister {
    store: Arc<dyn KeyValueStore>,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl HistoryPersister {
    pub fn new(store: Arc<dyn KeyValueStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedules a write of `snapshot` after the quiet period.
    ///
    /// A previously scheduled write that has not fired yet is cancelled;
    /// only the latest snapshot reaches storage. Durability here is
    /// at-least-the-latest-state-eventually, not every intermediate state.
    pub fn schedule(&self, snapshot: Vec<ChatMessage>) {
        let store = self.store.clone();
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            write(store.as_ref(), &snapshot).await;
        });

        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Writes `snapshot` immediately, cancelling any pending debounce.
    pub async fn flush(&self, snapshot: Vec<ChatMessage>) {
        if let Some(previous) = self.pending.lock().unwrap().take() {
            previous.abort();
        }
        write(self.store.as_ref(), &snapshot).await;
    }

    /// Rehydrates the persisted conversation.
    ///
    /// Failures are logged and yield an empty history; a corrupted cache
    /// must never block the user from chatting.
    pub async fn load(&self) -> Vec<ChatMessage> {
        let raw = match self.store.get(keys::CHAT_HISTORY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(target: "history", "failed to read persisted history: {err}");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(target: "history", "discarding unreadable history: {err}");
                Vec::new()
            }
        }
    }
}

async fn write(store: &dyn KeyValueStore, snapshot: &[ChatMessage]) {
    let raw = match serde_json::to_string(snapshot) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(target: "history", "failed to encode history: {err}");
            return;
        }
    };

    if let Err(err) = store.set(keys::CHAT_HISTORY, &raw).await {
        tracing::warn!(target: "history", "failed to persist history: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mentor_infrastructure::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for CountingStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key).await
        }
    }

    fn snapshot(content: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(content)]
    }

    #[tokio::test]
    async fn test_burst_of_mutations_coalesces_into_one_write() {
        let store = Arc::new(CountingStore::new());
        let persister = HistoryPersister::new(store.clone(), Duration::from_millis(30));

        persister.schedule(snapshot("one"));
        persister.schedule(snapshot("two"));
        persister.schedule(snapshot("three"));

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        let raw = store.get(keys::CHAT_HISTORY).await.unwrap().unwrap();
        let saved: Vec<ChatMessage> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved[0].content, "three");
    }

    #[tokio::test]
    async fn test_flush_writes_immediately_and_cancels_pending() {
        let store = Arc::new(CountingStore::new());
        let persister = HistoryPersister::new(store.clone(), Duration::from_millis(30));

        persister.schedule(snapshot("pending"));
        persister.flush(snapshot("flushed")).await;

        let raw = store.get(keys::CHAT_HISTORY).await.unwrap().unwrap();
        let saved: Vec<ChatMessage> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved[0].content, "flushed");

        // the cancelled debounce never fires
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_round_trips_timestamps() {
        let store = Arc::new(MemoryStore::new());
        let persister = HistoryPersister::new(store.clone(), Duration::from_millis(10));

        let original = snapshot("hello");
        persister.flush(original.clone()).await;

        let restored = persister.load().await;
        assert_eq!(restored, original);
        assert_eq!(restored[0].created_at, original[0].created_at);
    }

    #[tokio::test]
    async fn test_load_survives_corrupt_history() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::CHAT_HISTORY, "not json").await.unwrap();

        let persister = HistoryPersister::new(store, Duration::from_millis(10));
        assert!(persister.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_with_empty_store() {
        let persister =
            HistoryPersister::new(Arc::new(MemoryStore::new()), Duration::from_millis(10));
        assert!(persister.load().await.is_empty());
    }
}
