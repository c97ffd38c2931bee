//! Wire types for the completion endpoint.
//!
//! Request and response bodies for `POST {base}/chat/completions`, plus
//! the delta-event type decoded from streaming frames.

use mentor_core::message::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};

/// One message of conversation context as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: MessageRole,
    pub content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Terminal status of a completion choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

/// Non-streaming completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One incremental unit of a streaming response.
///
/// Carries an optional content fragment and an optional finish signal;
/// a present finish reason makes the event terminal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaEvent {
    pub content: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

impl DeltaEvent {
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Streaming frame body: `{"choices":[{"delta":{"content":...},"finish_reason":...}]}`
#[derive(Debug, Deserialize)]
pub(crate) struct DeltaFrame {
    pub choices: Vec<DeltaChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeltaChoice {
    #[serde(default)]
    pub delta: DeltaBody,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeltaBody {
    #[serde(default)]
    pub content: Option<String>,
}

impl From<DeltaFrame> for DeltaEvent {
    fn from(frame: DeltaFrame) -> Self {
        match frame.choices.into_iter().next() {
            Some(choice) => Self {
                content: choice.delta.content,
                finish_reason: choice.finish_reason,
            },
            None => Self::default(),
        }
    }
}
