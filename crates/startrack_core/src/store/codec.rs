//! Persisted blob, export and import encoding.
//!
//! # Responsibility
//! - Encode state for persistence (compact) and export (pretty-printed).
//! - Decode persisted blobs and merge imported payloads.
//!
//! # Invariants
//! - Import is a top-level shallow merge: present fields replace, absent
//!   fields keep current values. Achievements merge without re-locking.
//! - Imported events without `createdAt` are stamped with the import instant.
//! - A failed import never touches the current state.

use crate::model::achievement::AchievementBook;
use crate::model::event::Event;
use crate::model::settings::Settings;
use crate::model::state::AppState;
use crate::repo::kv_repo::StorageError;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key of the full-state blob.
pub const APP_DATA_KEY: &str = "star_track_chronicles_data";
/// Key of the first-run guide dismissal flag.
pub const WELCOMED_KEY: &str = "star_track_welcomed";

const EXPORT_FILE_PREFIX: &str = "star-track-chronicles";

/// Malformed persisted or imported payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidFormat(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(message) => write!(f, "invalid data format: {message}"),
        }
    }
}

impl Error for ParseError {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportPatch {
    events: Option<Vec<Event>>,
    check_ins: Option<Vec<DateTime<FixedOffset>>>,
    settings: Option<Settings>,
    achievements: Option<AchievementBook>,
}

/// Encodes state for the key-value store.
pub fn encode_state(state: &AppState) -> Result<String, StorageError> {
    serde_json::to_string(state).map_err(|err| StorageError::SerializationFailure(err.to_string()))
}

/// Decodes and validates a persisted blob.
pub fn decode_state(text: &str) -> Result<AppState, ParseError> {
    let mut state: AppState =
        serde_json::from_str(text).map_err(|err| ParseError::InvalidFormat(err.to_string()))?;
    state
        .validate()
        .map_err(|err| ParseError::InvalidFormat(err.to_string()))?;
    state.settings = state.settings.normalized();
    Ok(state)
}

/// Full-state pretty JSON for download.
pub fn export_state(state: &AppState) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(state)
        .map_err(|err| StorageError::SerializationFailure(err.to_string()))
}

/// Download file name stamped with the export instant.
pub fn export_file_name(now: DateTime<FixedOffset>) -> String {
    format!("{EXPORT_FILE_PREFIX}-{}.json", now.timestamp_millis())
}

/// Merges an imported payload over `current`.
///
/// `imported_at` fills `createdAt` on imported events that lack one.
///
/// # Errors
/// - `ParseError::InvalidFormat` when the payload is not a JSON object, a
///   present field has the wrong shape, or the merged events break id
///   invariants.
pub fn import_state(
    current: &AppState,
    bytes: &[u8],
    imported_at: DateTime<FixedOffset>,
) -> Result<AppState, ParseError> {
    let mut value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|err| ParseError::InvalidFormat(err.to_string()))?;
    if !value.is_object() {
        return Err(ParseError::InvalidFormat(
            "top-level value must be an object".to_string(),
        ));
    }
    stamp_missing_created_at(&mut value, imported_at);
    let patch: ImportPatch =
        serde_json::from_value(value).map_err(|err| ParseError::InvalidFormat(err.to_string()))?;

    let mut merged = current.clone();
    if let Some(events) = patch.events {
        merged.events = events;
    }
    if let Some(check_ins) = patch.check_ins {
        merged.check_ins = check_ins;
    }
    if let Some(settings) = patch.settings {
        merged.settings = settings.normalized();
    }
    if let Some(achievements) = patch.achievements {
        merged.achievements.merge_monotonic(&achievements);
    }

    merged
        .validate()
        .map_err(|err| ParseError::InvalidFormat(err.to_string()))?;
    Ok(merged)
}

fn stamp_missing_created_at(value: &mut serde_json::Value, imported_at: DateTime<FixedOffset>) {
    let Some(events) = value.get_mut("events").and_then(serde_json::Value::as_array_mut) else {
        return;
    };
    for event in events.iter_mut().filter_map(serde_json::Value::as_object_mut) {
        if event.get("createdAt").map_or(true, serde_json::Value::is_null) {
            event.insert(
                "createdAt".to_string(),
                serde_json::Value::String(imported_at.to_rfc3339()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_state, export_file_name, import_state, ParseError};
    use crate::model::achievement::AchievementKey;
    use crate::model::state::AppState;
    use chrono::{DateTime, FixedOffset};

    fn imported_at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-03-10T14:00:00+08:00").unwrap()
    }

    #[test]
    fn import_rejects_non_object_payloads() {
        let current = AppState::default();
        for payload in ["[]", "42", "\"text\"", "{not json"] {
            let err = import_state(&current, payload.as_bytes(), imported_at()).unwrap_err();
            assert!(matches!(err, ParseError::InvalidFormat(_)), "{payload}");
        }
    }

    #[test]
    fn import_keeps_absent_fields_and_never_relocks() {
        let mut current = AppState::default();
        current.achievements.unlock(AchievementKey::FirstEvent);
        current.settings.voice_enabled = true;

        let payload = br#"{ "checkIns": ["2026-01-01T08:00:00Z"], "achievements": {} }"#;
        let merged = import_state(&current, payload, imported_at()).unwrap();
        assert_eq!(merged.check_ins.len(), 1);
        assert!(merged.settings.voice_enabled);
        assert!(merged.achievements.is_unlocked(AchievementKey::FirstEvent));
    }

    #[test]
    fn import_stamps_events_missing_created_at() {
        let payload = br#"{ "events": [
            { "id": "a", "type": "capsule", "name": "x", "date": "2026-05-01" },
            { "id": "b", "type": "capsule", "name": "y", "date": "2026-05-01", "createdAt": null },
            { "id": "c", "type": "milestone", "name": "z", "date": "2025-01-01",
              "createdAt": "2025-01-01T09:00:00Z" }
        ] }"#;
        let merged = import_state(&AppState::default(), payload, imported_at()).unwrap();
        assert_eq!(merged.events[0].created_at(), imported_at());
        assert_eq!(merged.events[1].created_at(), imported_at());
        assert_eq!(
            merged.events[2].created_at(),
            DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z").unwrap()
        );
    }

    #[test]
    fn decode_rejects_duplicate_ids() {
        let blob = r##"{ "events": [
            { "id": "a", "type": "capsule", "name": "x", "date": "2026-01-01", "createdAt": "2026-01-01T00:00:00Z" },
            { "id": "a", "type": "milestone", "name": "y", "date": "2026-01-01", "createdAt": "2026-01-01T00:00:00Z" }
        ] }"##;
        assert!(decode_state(blob).is_err());
    }

    #[test]
    fn export_file_name_uses_epoch_millis() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap();
        assert_eq!(
            export_file_name(now),
            "star-track-chronicles-1767225600000.json"
        );
    }
}
