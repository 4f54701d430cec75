//! Key-value persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the local key-value contract the event store persists through.
//! - Isolate SQLite details from store and lifecycle orchestration.
//!
//! # Invariants
//! - Writes past the configured quota are rejected with
//!   `StorageError::QuotaExceeded` and leave the previous value intact.

pub mod kv_repo;
