//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validated state transitions over the event store.
//! - Keep presentation adapters decoupled from persistence details.

pub mod achievement_eval;
pub mod lifecycle_service;
