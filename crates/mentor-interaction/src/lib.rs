//! Completion client for the Mentor assistant pipeline.
//!
//! Builds and dispatches completion requests (batch or streaming) to the
//! remote model endpoint, decodes the streaming wire format into discrete
//! delta events, and classifies transport failures into the pipeline's
//! error taxonomy.

pub mod client;
pub mod error;
pub mod sse;
pub mod wire;

pub use client::{CompletionBackend, CompletionClient, DeltaStream};
pub use error::CompletionError;
pub use wire::{
    ChatCompletionResponse, Choice, CompletionRequest, DeltaEvent, FinishReason, Usage, WireMessage,
};
