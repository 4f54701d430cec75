//! Whole-application state persisted as one blob.
//!
//! # Responsibility
//! - Aggregate events, check-ins, settings and achievements.
//! - Validate structural invariants of state read from outside the process.
//!
//! # Invariants
//! - Event ids are non-blank and unique.
//! - Check-ins are append-only.

use crate::model::achievement::AchievementBook;
use crate::model::event::{Event, EventId, EventType};
use crate::model::settings::Settings;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persisted application state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub events: Vec<Event>,
    pub check_ins: Vec<DateTime<FixedOffset>>,
    pub settings: Settings,
    pub achievements: AchievementBook,
}

/// Structural problems in externally supplied state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValidationError {
    BlankEventId { index: usize },
    DuplicateEventId(EventId),
}

impl Display for StateValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankEventId { index } => write!(f, "event at index {index} has a blank id"),
            Self::DuplicateEventId(id) => write!(f, "duplicate event id: {id}"),
        }
    }
}

impl Error for StateValidationError {}

/// Per-type event counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounts {
    pub capsule: usize,
    pub track: usize,
    pub milestone: usize,
    pub letter: usize,
}

impl TypeCounts {
    pub fn get(&self, event_type: EventType) -> usize {
        match event_type {
            EventType::Capsule => self.capsule,
            EventType::Track => self.track,
            EventType::Milestone => self.milestone,
            EventType::Letter => self.letter,
        }
    }

    pub fn total(&self) -> usize {
        self.capsule + self.track + self.milestone + self.letter
    }
}

impl AppState {
    /// Checks id invariants on state that did not come from lifecycle calls.
    pub fn validate(&self) -> Result<(), StateValidationError> {
        let mut seen = HashSet::with_capacity(self.events.len());
        for (index, event) in self.events.iter().enumerate() {
            if event.id.is_blank() {
                return Err(StateValidationError::BlankEventId { index });
            }
            if !seen.insert(&event.id) {
                return Err(StateValidationError::DuplicateEventId(event.id.clone()));
            }
        }
        Ok(())
    }

    pub fn find_event(&self, id: &EventId) -> Option<&Event> {
        self.events.iter().find(|event| &event.id == id)
    }

    pub(crate) fn find_event_mut(&mut self, id: &EventId) -> Option<&mut Event> {
        self.events.iter_mut().find(|event| &event.id == id)
    }

    pub fn contains_event(&self, id: &EventId) -> bool {
        self.find_event(id).is_some()
    }

    pub fn type_counts(&self) -> TypeCounts {
        let mut counts = TypeCounts::default();
        for event in &self.events {
            match event.event_type() {
                EventType::Capsule => counts.capsule += 1,
                EventType::Track => counts.track += 1,
                EventType::Milestone => counts.milestone += 1,
                EventType::Letter => counts.letter += 1,
            }
        }
        counts
    }
}
