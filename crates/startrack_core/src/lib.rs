//! Core domain logic for Star Track Chronicles.
//! This crate is the single source of truth for event lifecycle invariants.

pub mod clock;
pub mod config;
pub mod countdown;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CoreConfig;
pub use countdown::{countdown, countdown_from_str, parse_timestamp, Countdown, CountdownParts};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::achievement::{AchievementBook, AchievementKey, AchievementRecord};
pub use model::event::{
    Event, EventDraft, EventId, EventKind, EventType, EventValidationError, Milestone,
};
pub use model::settings::Settings;
pub use model::state::{AppState, StateValidationError, TypeCounts};
pub use repo::kv_repo::{
    InMemoryKvRepository, KvRepository, SqliteKvRepository, StorageError, StorageResult,
};
pub use service::achievement_eval::evaluate as evaluate_achievements;
pub use service::lifecycle_service::{
    EventLifecycle, LifecycleEffect, LifecycleError, LifecycleResult, Mutation, Reminder,
    ReminderKind,
};
pub use store::codec::{export_file_name, import_state, ParseError};
pub use store::event_store::{load_state, AutosaveOutcome, EventStore};

/// Minimal health-check API for adapter integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
