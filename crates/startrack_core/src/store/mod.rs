//! Event store: owned in-memory state plus its persistence discipline.
//!
//! # Responsibility
//! - Load state fail-soft, save it after mutations, export and import it.
//! - Gate opportunistic saves while a bulk replace is in flight.
//!
//! # Invariants
//! - The whole state is persisted as one JSON blob under `APP_DATA_KEY`.
//! - Autosave never writes while a bulk operation is open, nor after a bulk
//!   commit whose write failed, until a later save succeeds.

pub mod bulk;
pub mod codec;
pub mod event_store;
