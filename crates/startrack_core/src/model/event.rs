//! Event domain model.
//!
//! # Responsibility
//! - Define the canonical event record shared by the orbit and list views.
//! - Keep type-specific fields inside `EventKind`, so no variant carries
//!   fields that are meaningless for its type.
//! - Provide lifecycle helpers for progress and milestone edits.
//!
//! # Invariants
//! - `id` is stable and never reused for another event.
//! - `kind` (and therefore the event type) never changes after creation.
//! - Track `progress` stays within `0..=100`, including on deserialization.
//! - Milestone-derived progress is recomputed on toggle only.

use crate::countdown::parse_timestamp;
use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const PROGRESS_MAX: u8 = 100;
pub const PROGRESS_HALF: u8 = 50;
pub const STAR_COUNT_MIN: u8 = 1;
pub const STAR_COUNT_MAX: u8 = 5;
pub const STAR_COUNT_DEFAULT: u8 = 3;
pub const DEFAULT_EVENT_COLOR: &str = "#00d4ff";
pub const DEFAULT_LETTER_COLOR: &str = "#10b981";

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));

/// Stable identifier of one event.
///
/// Newly created events get a UUID v4 string; imported records keep
/// whatever non-empty id they already carry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps caller-provided text, rejecting blank values.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event category. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Countdown to a future date.
    Capsule,
    /// Progress-tracked goal with an optional milestone checklist.
    Track,
    /// Recorded past achievement.
    Milestone,
    /// Future-dated personal note.
    Letter,
}

impl EventType {
    pub const ALL: [EventType; 4] = [Self::Capsule, Self::Track, Self::Milestone, Self::Letter];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capsule => "capsule",
            Self::Track => "track",
            Self::Milestone => "milestone",
            Self::Letter => "letter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "capsule" => Some(Self::Capsule),
            "track" => Some(Self::Track),
            "milestone" => Some(Self::Milestone),
            "letter" => Some(Self::Letter),
            _ => None,
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checklist item inside a track event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

impl Milestone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: false,
        }
    }
}

/// Type tag plus the fields that only exist for that type.
///
/// Serialized flat into the owning event, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    Capsule,
    Track {
        #[serde(default, deserialize_with = "deserialize_progress")]
        progress: u8,
        #[serde(default)]
        milestones: Vec<Milestone>,
    },
    Milestone,
    Letter {
        #[serde(
            rename = "starCount",
            default = "default_star_count",
            deserialize_with = "deserialize_star_count"
        )]
        star_count: u8,
    },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Capsule => EventType::Capsule,
            Self::Track { .. } => EventType::Track,
            Self::Milestone => EventType::Milestone,
            Self::Letter { .. } => EventType::Letter,
        }
    }
}

/// Canonical event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub(crate) id: EventId,
    #[serde(flatten)]
    pub(crate) kind: EventKind,
    pub name: String,
    /// ISO-8601 text as entered; meaning depends on the event type.
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub important: bool,
    /// Set by lifecycle actions only.
    #[serde(default)]
    pub completed: bool,
    pub(crate) created_at: DateTime<FixedOffset>,
}

/// Old and new progress of one track edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressChange {
    pub old: u8,
    pub new: u8,
}

impl ProgressChange {
    /// Upward crossing of the halfway mark on this edit.
    pub fn crossed_half(self) -> bool {
        self.old < PROGRESS_HALF && self.new >= PROGRESS_HALF
    }

    /// Upward arrival at 100 on this edit.
    pub fn reached_completion(self) -> bool {
        self.old < PROGRESS_MAX && self.new == PROGRESS_MAX
    }
}

/// Rejected track edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEditError {
    NotTrack(EventType),
    IndexOutOfRange { index: usize, len: usize },
}

impl Event {
    /// Builds a new event from validated form input.
    ///
    /// # Invariants
    /// - `completed` starts as `false`.
    /// - Track milestones start incomplete; progress is the supplied value
    ///   clamped to `0..=100` (default 0).
    /// - Letter star count is clamped to `1..=5` (default 3).
    ///
    /// # Errors
    /// - Returns `EventValidationError` for blank name/date, unparseable
    ///   date, malformed color, or a letter without content.
    pub fn from_draft(
        id: EventId,
        draft: &EventDraft,
        created_at: DateTime<FixedOffset>,
    ) -> Result<Self, EventValidationError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(EventValidationError::MissingName);
        }
        let date = draft.date.trim();
        if date.is_empty() {
            return Err(EventValidationError::MissingDate);
        }
        if parse_timestamp(date, created_at.offset()).is_none() {
            return Err(EventValidationError::InvalidDate(date.to_string()));
        }
        let description = draft.description.trim();
        if draft.event_type == EventType::Letter && description.is_empty() {
            return Err(EventValidationError::MissingLetterContent);
        }

        let color = match draft.color.as_deref() {
            Some(raw) => normalize_color(raw)?,
            None if draft.event_type == EventType::Letter => DEFAULT_LETTER_COLOR.to_string(),
            None => DEFAULT_EVENT_COLOR.to_string(),
        };

        let kind = match draft.event_type {
            EventType::Capsule => EventKind::Capsule,
            EventType::Track => EventKind::Track {
                progress: clamp_progress(draft.progress.unwrap_or(0)),
                milestones: draft
                    .milestones
                    .as_deref()
                    .map(parse_milestone_list)
                    .unwrap_or_default(),
            },
            EventType::Milestone => EventKind::Milestone,
            EventType::Letter => EventKind::Letter {
                star_count: clamp_star_count(
                    draft.star_count.unwrap_or(i64::from(STAR_COUNT_DEFAULT)),
                ),
            },
        };

        Ok(Self {
            id,
            kind,
            name: name.to_string(),
            date: date.to_string(),
            description: description.to_string(),
            color,
            // Letters are never flagged important at creation.
            important: draft.important && draft.event_type != EventType::Letter,
            completed: false,
            created_at,
        })
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    /// Track progress; `None` for other types.
    pub fn progress(&self) -> Option<u8> {
        match &self.kind {
            EventKind::Track { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    /// Track checklist; empty for other types.
    pub fn milestones(&self) -> &[Milestone] {
        match &self.kind {
            EventKind::Track { milestones, .. } => milestones,
            _ => &[],
        }
    }

    /// Letter decoration; `None` for other types.
    pub fn star_count(&self) -> Option<u8> {
        match &self.kind {
            EventKind::Letter { star_count } => Some(*star_count),
            _ => None,
        }
    }

    /// Resolves `date` into an absolute instant.
    ///
    /// Offset-less values are read in `local_offset`.
    pub fn target_time(&self, local_offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.date, local_offset)
    }

    /// Sets track progress, clamping into `0..=100`.
    pub(crate) fn set_progress(&mut self, value: i64) -> Result<ProgressChange, TrackEditError> {
        let event_type = self.event_type();
        match &mut self.kind {
            EventKind::Track { progress, .. } => {
                let old = *progress;
                *progress = clamp_progress(value);
                Ok(ProgressChange {
                    old,
                    new: *progress,
                })
            }
            _ => Err(TrackEditError::NotTrack(event_type)),
        }
    }

    /// Flips one milestone and recomputes progress from the checklist.
    pub(crate) fn toggle_milestone(
        &mut self,
        index: usize,
    ) -> Result<ProgressChange, TrackEditError> {
        let event_type = self.event_type();
        match &mut self.kind {
            EventKind::Track {
                progress,
                milestones,
            } => {
                let len = milestones.len();
                let milestone = milestones
                    .get_mut(index)
                    .ok_or(TrackEditError::IndexOutOfRange { index, len })?;
                milestone.completed = !milestone.completed;

                let old = *progress;
                *progress = milestone_progress(milestones);
                Ok(ProgressChange {
                    old,
                    new: *progress,
                })
            }
            _ => Err(TrackEditError::NotTrack(event_type)),
        }
    }

    /// Marks completion; returns whether the flag changed.
    pub(crate) fn mark_completed(&mut self) -> bool {
        let changed = !self.completed;
        self.completed = true;
        changed
    }
}

/// User-submitted creation form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub event_type: EventType,
    pub name: String,
    pub date: String,
    /// Letter content for `EventType::Letter`.
    pub description: String,
    /// `#RRGGBB`; type default when absent.
    pub color: Option<String>,
    pub important: bool,
    /// Initial track progress; clamped.
    pub progress: Option<i64>,
    /// Newline-delimited track checklist.
    pub milestones: Option<String>,
    /// Letter star count; clamped to `1..=5`.
    pub star_count: Option<i64>,
}

impl EventDraft {
    pub fn new(event_type: EventType, name: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            event_type,
            name: name.into(),
            date: date.into(),
            description: String::new(),
            color: None,
            important: false,
            progress: None,
            milestones: None,
            star_count: None,
        }
    }
}

/// Validation errors for event creation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    MissingName,
    MissingDate,
    InvalidDate(String),
    InvalidColor(String),
    MissingLetterContent,
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "event name must not be blank"),
            Self::MissingDate => write!(f, "event date must not be blank"),
            Self::InvalidDate(value) => write!(f, "event date is not ISO-8601: `{value}`"),
            Self::InvalidColor(value) => write!(f, "color must be #RRGGBB, got `{value}`"),
            Self::MissingLetterContent => write!(f, "letter content must not be blank"),
        }
    }
}

impl Error for EventValidationError {}

/// Splits a newline-delimited checklist into incomplete milestones.
///
/// Blank lines are dropped.
pub fn parse_milestone_list(text: &str) -> Vec<Milestone> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Milestone::new)
        .collect()
}

/// `round(100 * completed / total)`, rounding halves up.
pub fn milestone_progress(milestones: &[Milestone]) -> u8 {
    let total = milestones.len();
    if total == 0 {
        return 0;
    }
    let completed = milestones.iter().filter(|m| m.completed).count();
    let rounded = (200 * completed + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(PROGRESS_MAX)
}

pub fn clamp_progress(value: i64) -> u8 {
    u8::try_from(value.clamp(0, i64::from(PROGRESS_MAX))).unwrap_or(PROGRESS_MAX)
}

pub fn clamp_star_count(value: i64) -> u8 {
    u8::try_from(value.clamp(i64::from(STAR_COUNT_MIN), i64::from(STAR_COUNT_MAX)))
        .unwrap_or(STAR_COUNT_DEFAULT)
}

/// Validates `#RRGGBB` and lowercases it.
pub fn normalize_color(value: &str) -> Result<String, EventValidationError> {
    let trimmed = value.trim();
    if !HEX_COLOR_RE.is_match(trimmed) {
        return Err(EventValidationError::InvalidColor(trimmed.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

fn default_color() -> String {
    DEFAULT_EVENT_COLOR.to_string()
}

fn default_star_count() -> u8 {
    STAR_COUNT_DEFAULT
}

// Persisted numbers may be floats or out of range; clamp instead of failing
// the whole blob.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_progress(round_lenient(raw)))
}

fn deserialize_star_count<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_star_count(round_lenient(raw)))
}

fn round_lenient(raw: f64) -> i64 {
    if raw.is_nan() {
        return 0;
    }
    // Saturating float-to-int cast.
    raw.round() as i64
}

#[cfg(test)]
mod tests {
    use super::{milestone_progress, normalize_color, parse_milestone_list, Milestone};

    #[test]
    fn milestone_progress_rounds_half_up() {
        let mut items = vec![Milestone::new("a"), Milestone::new("b"), Milestone::new("c")];
        items[0].completed = true;
        assert_eq!(milestone_progress(&items), 33);
        items[1].completed = true;
        assert_eq!(milestone_progress(&items), 67);

        let mut eight = (0..8).map(|i| Milestone::new(i.to_string())).collect::<Vec<_>>();
        eight[0].completed = true;
        // 12.5 rounds up like the UI expects.
        assert_eq!(milestone_progress(&eight), 13);
    }

    #[test]
    fn milestone_progress_of_empty_list_is_zero() {
        assert_eq!(milestone_progress(&[]), 0);
    }

    #[test]
    fn parse_milestone_list_trims_and_drops_blank_lines() {
        let items = parse_milestone_list("  read docs \n\n  \r\nship it\r\n");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "read docs");
        assert_eq!(items[1].name, "ship it");
        assert!(items.iter().all(|m| !m.completed));
    }

    #[test]
    fn normalize_color_lowercases_and_rejects_garbage() {
        assert_eq!(normalize_color(" #FFD700 ").unwrap(), "#ffd700");
        assert!(normalize_color("gold").is_err());
        assert!(normalize_color("#fff").is_err());
    }
}
