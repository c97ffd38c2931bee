//! The conversational session orchestrator.
//!
//! `ChatSession` drives the end-to-end request lifecycle: it gates every
//! send through the security policy engine, dispatches to the completion
//! backend in batch or streaming mode, reconciles partial results into the
//! conversation log as they arrive, and recovers from failure without ever
//! leaving a half-sent turn behind.

use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use mentor_core::config::AssistantConfig;
use mentor_core::conversation::ConversationLog;
use mentor_core::message::{ChatMessage, MessagePatch, MessageRole};
use mentor_core::security::{
    ContentSanitizer, ContentValidator, FingerprintProvider, RateLimiter, RequestSigner,
    SessionManager,
};
use mentor_core::storage::KeyValueStore;
use mentor_infrastructure::JsonFileStore;
use mentor_interaction::client::{CompletionBackend, CompletionClient};
use mentor_interaction::error::CompletionError;
use mentor_interaction::wire::WireMessage;

use crate::persistence::HistoryPersister;

/// Category of a failed turn, for caller-side display decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// Content rejected by policy; the network was never contacted.
    Validation,
    /// Denied locally or by the upstream provider.
    RateLimit,
    /// Upstream rejected credentials.
    Auth,
    /// No response received.
    Network,
    /// Upstream returned an error status.
    Api,
    /// A streaming frame could not be decoded.
    Decode,
    /// Anything uncategorized.
    Unknown,
}

/// An error surfaced to the caller and recorded as the conversation's
/// last error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

impl ChatError {
    fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn from_completion(err: &CompletionError) -> Self {
        let kind = match err {
            CompletionError::Auth(_) => ChatErrorKind::Auth,
            CompletionError::UpstreamRateLimit(_) => ChatErrorKind::RateLimit,
            CompletionError::Server { .. } | CompletionError::Api { .. } => ChatErrorKind::Api,
            CompletionError::Network(_) => ChatErrorKind::Network,
            CompletionError::Decode(_) => ChatErrorKind::Decode,
            CompletionError::Unknown(_) => ChatErrorKind::Unknown,
        };
        Self::new(kind, err.to_string())
    }
}

/// Orchestrates one conversation.
///
/// At most one send or stream is in flight at a time; a second call while
/// a request is outstanding is a no-op. All components are injected so
/// tests substitute fresh instances per test.
pub struct ChatSession {
    backend: Arc<dyn CompletionBackend>,
    validator: ContentValidator,
    limiter: RateLimiter,
    sessions: SessionManager,
    fingerprints: Arc<FingerprintProvider>,
    persister: HistoryPersister,
    log: tokio::sync::Mutex<ConversationLog>,
    in_flight: AtomicBool,
    streaming: AtomicBool,
    last_error: std::sync::Mutex<Option<ChatError>>,
    cancel: std::sync::Mutex<CancellationToken>,
    context_window: usize,
    capacity: usize,
}

impl ChatSession {
    /// Creates a session from injected collaborators.
    pub fn new(
        config: AssistantConfig,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn CompletionBackend>,
        fingerprints: Arc<FingerprintProvider>,
    ) -> Self {
        Self {
            backend,
            validator: ContentValidator::new(config.security.max_message_chars),
            limiter: RateLimiter::new(store.clone(), config.rate_limit.clone()),
            sessions: SessionManager::new(
                store.clone(),
                fingerprints.clone(),
                config.session.clone(),
            ),
            fingerprints,
            persister: HistoryPersister::new(
                store,
                Duration::from_millis(config.history.persist_debounce_ms),
            ),
            log: tokio::sync::Mutex::new(ConversationLog::with_capacity(config.history.capacity)),
            in_flight: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            last_error: std::sync::Mutex::new(None),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
            context_window: config.history.context_window,
            capacity: config.history.capacity,
        }
    }

    /// Creates a session wired to the real completion endpoint and the
    /// default file-backed store.
    ///
    /// # Errors
    ///
    /// Returns an error if the default storage location cannot be resolved.
    pub fn with_defaults(config: AssistantConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::default_location()?);
        let fingerprints = Arc::new(FingerprintProvider::detect());
        let signer = Arc::new(RequestSigner::new(
            config.security.app_secret.clone(),
            fingerprints.clone(),
        ));
        let backend = Arc::new(CompletionClient::new(&config.completion, signer));
        Ok(Self::new(config, store, backend, fingerprints))
    }

    /// Submits user content as a new turn.
    ///
    /// A no-op while another send or stream is outstanding. Validation and
    /// local rate-limit denials resolve before any network contact and
    /// never append a half-sent turn; network, API, and decode failures
    /// attach to the in-progress assistant message.
    pub async fn send_message(
        &self,
        content: &str,
        use_streaming: bool,
    ) -> Result<(), ChatError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(target: "chat", "send ignored: request already in flight");
            return Ok(());
        }

        let result = self.drive_send(content, use_streaming).await;

        if let Err(err) = &result {
            *self.last_error.lock().unwrap() = Some(err.clone());
        }
        // flags clear on every outcome path
        self.streaming.store(false, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn drive_send(&self, content: &str, use_streaming: bool) -> Result<(), ChatError> {
        *self.last_error.lock().unwrap() = None;

        self.validator
            .validate(content)
            .map_err(|err| ChatError::new(ChatErrorKind::Validation, err.to_string()))?;

        let sanitized = ContentSanitizer::sanitize_input(content);
        if sanitized.is_empty() {
            return Ok(());
        }

        let fingerprint = self.fingerprints.fingerprint();
        let decision = self.limiter.check(&fingerprint).await;
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "rate limit exceeded".to_string());
            return Err(ChatError::new(ChatErrorKind::RateLimit, reason));
        }

        if let Err(err) = self.sessions.ensure_session().await {
            // session upkeep must not block the turn
            tracing::warn!(target: "chat", "session upkeep failed: {err}");
        }

        let placeholder = ChatMessage::placeholder(use_streaming);
        let placeholder_id = placeholder.id.clone();
        let context = {
            let mut log = self.log.lock().await;
            log.append(ChatMessage::user(sanitized));
            let context: Vec<WireMessage> = log
                .tail(self.context_window)
                .iter()
                .map(WireMessage::from)
                .collect();
            log.append(placeholder);
            self.persist_soon(&log);
            context
        };

        if use_streaming {
            self.streaming.store(true, Ordering::SeqCst);
        }

        let outcome = if use_streaming {
            self.consume_stream(context, &placeholder_id).await
        } else {
            self.run_batch(context, &placeholder_id).await
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => {
                let chat_err = ChatError::from_completion(&err);
                let mut log = self.log.lock().await;
                // accumulated streamed content stays on the message
                log.update(&placeholder_id, &MessagePatch::fail(chat_err.message.clone()));
                self.persist_soon(&log);
                Err(chat_err)
            }
        }
    }

    async fn run_batch(
        &self,
        context: Vec<WireMessage>,
        placeholder_id: &str,
    ) -> Result<(), CompletionError> {
        let response = self.backend.complete(context).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Unknown("completion returned no content".to_string()))?;

        let mut log = self.log.lock().await;
        log.update(
            placeholder_id,
            &MessagePatch::finish(ContentSanitizer::sanitize_output(&content)),
        );
        self.persist_soon(&log);
        Ok(())
    }

    async fn consume_stream(
        &self,
        context: Vec<WireMessage>,
        placeholder_id: &str,
    ) -> Result<(), CompletionError> {
        let cancel = {
            let mut guard = self.cancel.lock().unwrap();
            *guard = CancellationToken::new();
            guard.clone()
        };

        let mut stream = self.backend.stream(context, cancel).await?;
        let mut accumulated = String::new();

        // frames apply strictly in arrival order; the loop suspends
        // between frames waiting for the next chunk or stream close
        while let Some(event) = stream.next().await {
            let event = event?;
            if let Some(fragment) = &event.content {
                accumulated.push_str(fragment);
                let mut log = self.log.lock().await;
                log.update(
                    placeholder_id,
                    &MessagePatch::new().content(accumulated.clone()),
                );
                self.persist_soon(&log);
            }
            if event.is_terminal() {
                break;
            }
        }

        let mut log = self.log.lock().await;
        log.update(
            placeholder_id,
            &MessagePatch::finish(ContentSanitizer::sanitize_output(&accumulated)),
        );
        self.persist_soon(&log);
        Ok(())
    }

    /// Re-submits the user content behind a failed assistant message.
    ///
    /// A no-op unless the message exists, carries an error, and is
    /// immediately preceded by the originating user message. The failed
    /// message is removed and the content re-enters the full
    /// validation/rate-limit/send pipeline; a partial stream is never
    /// resumed.
    pub async fn retry_message(&self, message_id: &str) -> Result<(), ChatError> {
        let original = {
            let mut log = self.log.lock().await;
            let Some(index) = log.position(message_id) else {
                return Ok(());
            };
            let message = &log.messages()[index];
            if !message.is_failed() || index == 0 {
                return Ok(());
            }
            let previous = &log.messages()[index - 1];
            if previous.role != MessageRole::User {
                return Ok(());
            }
            let content = previous.content.clone();
            log.remove(message_id);
            self.persist_soon(&log);
            content
        };

        self.send_message(&original, false).await
    }

    /// Appends a message directly to the log.
    pub async fn add_message(&self, message: ChatMessage) {
        let mut log = self.log.lock().await;
        log.append(message);
        self.persist_soon(&log);
    }

    /// Removes a message from the log.
    pub async fn delete_message(&self, message_id: &str) {
        let mut log = self.log.lock().await;
        log.remove(message_id);
        self.persist_soon(&log);
    }

    /// Empties the conversation and resets streaming/error state.
    ///
    /// An in-flight stream is cancelled; its guard clears when the active
    /// turn unwinds.
    pub async fn clear_chat(&self) {
        self.cancel.lock().unwrap().cancel();

        let mut log = self.log.lock().await;
        log.clear();
        self.persist_soon(&log);
        drop(log);

        self.streaming.store(false, Ordering::SeqCst);
        *self.last_error.lock().unwrap() = None;
    }

    /// Cancels an in-flight stream.
    ///
    /// The placeholder message is finalized with whatever content had
    /// accumulated.
    pub fn cancel(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    /// Rehydrates the conversation from the durable store.
    pub async fn load_history(&self) {
        let messages = self.persister.load().await;
        let mut log = self.log.lock().await;
        *log = ConversationLog::from_messages(messages, self.capacity);
    }

    /// Writes the conversation to the durable store immediately.
    pub async fn save_history(&self) {
        let log = self.log.lock().await;
        self.persister.flush(log.snapshot()).await;
    }

    /// Returns an ordered snapshot of the conversation.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.log.lock().await.snapshot()
    }

    /// True while a send or stream is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// True while streamed fragments are being applied.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// The most recent failure, for banner-style display.
    pub fn last_error(&self) -> Option<ChatError> {
        self.last_error.lock().unwrap().clone()
    }

    fn persist_soon(&self, log: &ConversationLog) {
        self.persister.schedule(log.snapshot());
    }
}
