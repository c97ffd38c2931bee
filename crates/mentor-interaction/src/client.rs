//! Completion endpoint client.
//!
//! Dispatches batch and streaming completion requests with the security
//! headers from the policy engine attached. Streaming responses are
//! decoded on a background task and surfaced as a finite, non-restartable
//! stream of delta events.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use mentor_core::config::CompletionConfig;
use mentor_core::security::RequestSigner;

use crate::error::CompletionError;
use crate::sse::SseFrameDecoder;
use crate::wire::{ChatCompletionResponse, CompletionRequest, DeltaEvent, WireMessage};

/// A lazily-produced, finite sequence of streaming delta events.
pub type DeltaStream = BoxStream<'static, Result<DeltaEvent, CompletionError>>;

/// Abstraction over the completion endpoint.
///
/// The orchestrator only talks to this trait; tests substitute mock
/// backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Sends the context as a single non-streaming completion request.
    async fn complete(
        &self,
        messages: Vec<WireMessage>,
    ) -> Result<ChatCompletionResponse, CompletionError>;

    /// Sends the context as a streaming request.
    ///
    /// The returned sequence ends on a terminal frame, on transport close,
    /// or when `cancel` is tripped.
    async fn stream(
        &self,
        messages: Vec<WireMessage>,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, CompletionError>;
}

/// HTTP client for the completion endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    referer: String,
    app_title: String,
    signer: Arc<RequestSigner>,
}

impl CompletionClient {
    /// Creates a client from the completion configuration.
    pub fn new(config: &CompletionConfig, signer: Arc<RequestSigner>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            referer: config.referer.clone(),
            app_title: config.app_title.clone(),
            signer,
        }
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, messages: Vec<WireMessage>, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            stream,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// Serializes the body, signs it, and dispatches the request.
    ///
    /// Non-success statuses are read and classified here so both dispatch
    /// modes share one error path.
    async fn dispatch(
        &self,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response, CompletionError> {
        let payload = serde_json::to_string(request)
            .map_err(|err| CompletionError::Unknown(format!("failed to encode request: {err}")))?;
        let signed = self.signer.signed_headers(&payload);

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .header("X-Timestamp", &signed.timestamp)
            .header("X-Nonce", &signed.nonce)
            .header("X-Signature", &signed.signature)
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(CompletionError::from_status(status, body));
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(
        &self,
        messages: Vec<WireMessage>,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let request = self.build_request(messages, false);
        let response = self.dispatch(&request).await?;

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|err| CompletionError::Unknown(format!("failed to parse response: {err}")))
    }

    async fn stream(
        &self,
        messages: Vec<WireMessage>,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, CompletionError> {
        let request = self.build_request(messages, true);
        let response = self.dispatch(&request).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<DeltaEvent, CompletionError>>(32);
        let mut body = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = SseFrameDecoder::new();
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(target: "completion", "stream cancelled by caller");
                        return;
                    }
                    chunk = body.next() => chunk,
                };

                match chunk {
                    Some(Ok(bytes)) => match decoder.push(&bytes) {
                        Ok(events) => {
                            for event in events {
                                let terminal = event.is_terminal();
                                if tx.send(Ok(event)).await.is_err() {
                                    // receiver dropped; nothing left to feed
                                    return;
                                }
                                if terminal {
                                    return;
                                }
                            }
                            if decoder.is_finished() {
                                return;
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                    },
                    Some(Err(err)) => {
                        let _ = tx.send(Err(CompletionError::Network(err.to_string()))).await;
                        return;
                    }
                    // transport closed
                    None => return,
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}
