//! Session orchestration for the Mentor assistant pipeline.
//!
//! Drives the end-to-end request lifecycle: policy gating, completion
//! dispatch, incremental reconciliation of streamed output into the
//! conversation log, and debounced history persistence.

pub mod chat_session;
pub mod persistence;

pub use chat_session::{ChatError, ChatErrorKind, ChatSession};
pub use persistence::HistoryPersister;
