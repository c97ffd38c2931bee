//! Storage backends for the Mentor assistant pipeline.
//!
//! Implements the `KeyValueStore` contract from `mentor-core` over an
//! in-memory map (tests, ephemeral use) and over per-key JSON files with
//! atomic writes.

pub mod json_file_store;
pub mod memory_store;

pub use json_file_store::JsonFileStore;
pub use memory_store::MemoryStore;
