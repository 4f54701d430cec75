//! Runtime configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve store path, logging and quota settings for adapters.
//!
//! # Invariants
//! - Blank or unparseable variables fall back to defaults; resolution never
//!   fails.

use crate::logging::LogLevel;
use crate::repo::kv_repo::DEFAULT_QUOTA_BYTES;
use log::warn;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "STARTRACK_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "STARTRACK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "STARTRACK_LOG_DIR";
pub const ENV_QUOTA_BYTES: &str = "STARTRACK_STORAGE_QUOTA_BYTES";

const DEFAULT_DB_FILE_NAME: &str = "startrack.sqlite3";

/// Adapter-facing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: LogLevel,
    /// File logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
    pub quota_bytes: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: LogLevel::build_default(),
            log_dir: None,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl CoreConfig {
    /// Reads `STARTRACK_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log_level = match read(ENV_LOG_LEVEL) {
            Some(raw) => LogLevel::parse(&raw).unwrap_or_else(|err| {
                warn!("event=config_resolve module=config status=fallback key={ENV_LOG_LEVEL} error={err}");
                defaults.log_level
            }),
            None => defaults.log_level,
        };

        let quota_bytes = match read(ENV_QUOTA_BYTES) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    warn!("event=config_resolve module=config status=fallback key={ENV_QUOTA_BYTES}");
                    defaults.quota_bytes
                }
            },
            None => defaults.quota_bytes,
        };

        Self {
            db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_level,
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            quota_bytes,
        }
    }
}
