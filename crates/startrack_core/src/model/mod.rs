//! Domain model for tracked events and the state persisted around them.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the persisted wire shape (camelCase JSON, events tagged by `type`).
//!
//! # Invariants
//! - Every event is identified by a stable `EventId`, unique in the state.
//! - Per-type fields live in `EventKind` variants only.

pub mod achievement;
pub mod event;
pub mod settings;
pub mod state;
