//! Event lifecycle use-case service.
//!
//! # Responsibility
//! - Provide create/progress/toggle/complete/delete entry points.
//! - Re-evaluate achievements and persist after every mutation.
//! - Report what happened as `LifecycleEffect` values for presentation
//!   adapters, instead of triggering visuals directly.
//!
//! # Invariants
//! - Effects are returned only after the mutation is applied in memory and a
//!   save has been attempted.
//! - A failed save never undoes the in-memory mutation.
//! - Half-way and completion effects are edge-triggered on old -> new.
//! - Deleting an unknown id always returns `LifecycleError::NotFound`.

use crate::clock::Clock;
use crate::countdown::{countdown, Countdown};
use crate::model::achievement::{AchievementBook, AchievementKey};
use crate::model::event::{
    Event, EventDraft, EventId, EventType, EventValidationError, ProgressChange, TrackEditError,
};
use crate::model::settings::Settings;
use crate::model::state::{AppState, StateValidationError, TypeCounts};
use crate::repo::kv_repo::{KvRepository, StorageError, StorageResult};
use crate::service::achievement_eval::refresh_achievements;
use crate::store::codec::{export_file_name, ParseError};
use crate::store::event_store::{AutosaveOutcome, EventStore};
use chrono::{DateTime, Duration, FixedOffset};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Something that happened during a mutation, for adapters to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEffect {
    EventCreated { id: EventId, event_type: EventType },
    /// Track progress moved from below 50 to 50 or more.
    ProgressCrossedHalf { id: EventId },
    /// Track progress moved from below 100 to exactly 100.
    ReachedCompletion { id: EventId },
    /// `completed` flipped to true through an explicit mark.
    MarkedCompleted { id: EventId },
    EventDeleted { id: EventId },
    CheckedIn { at: DateTime<FixedOffset> },
    AchievementUnlocked { key: AchievementKey },
}

impl LifecycleEffect {
    /// Stable label for logs and adapter envelopes.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "event_created",
            Self::ProgressCrossedHalf { .. } => "progress_crossed_half",
            Self::ReachedCompletion { .. } => "reached_completion",
            Self::MarkedCompleted { .. } => "marked_completed",
            Self::EventDeleted { .. } => "event_deleted",
            Self::CheckedIn { .. } => "checked_in",
            Self::AchievementUnlocked { .. } => "achievement_unlocked",
        }
    }
}

/// Outcome of a committed mutation.
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub effects: Vec<LifecycleEffect>,
    /// Persistence failure, if any. The mutation itself still stands.
    pub save_error: Option<StorageError>,
}

impl<T> Mutation<T> {
    fn unchanged(value: T) -> Self {
        Self {
            value,
            effects: Vec::new(),
            save_error: None,
        }
    }

    pub fn has_effect(&self, predicate: impl Fn(&LifecycleEffect) -> bool) -> bool {
        self.effects.iter().any(predicate)
    }

    pub fn unlocked(&self) -> Vec<AchievementKey> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                LifecycleEffect::AchievementUnlocked { key } => Some(*key),
                _ => None,
            })
            .collect()
    }
}

/// Lifecycle operation errors. All are recoverable; the operation is aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    Validation(EventValidationError),
    NotFound(EventId),
    MilestoneIndexOutOfRange {
        id: EventId,
        index: usize,
        len: usize,
    },
    NotTrack {
        id: EventId,
        event_type: EventType,
    },
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::MilestoneIndexOutOfRange { id, index, len } => write!(
                f,
                "milestone index {index} out of range for event {id} ({len} milestones)"
            ),
            Self::NotTrack { id, event_type } => {
                write!(f, "event {id} is a {event_type}, not a track")
            }
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventValidationError> for LifecycleError {
    fn from(value: EventValidationError) -> Self {
        Self::Validation(value)
    }
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::MilestoneIndexOutOfRange { .. } => "index_out_of_range",
            Self::NotTrack { .. } => "not_track",
        }
    }
}

pub type LifecycleResult<T> = Result<Mutation<T>, LifecycleError>;

/// Why an event deserves a reminder right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// Target is between 23 and 24 hours away.
    EventApproaching,
    /// A letter's open date has passed.
    LetterReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: EventId,
    pub kind: ReminderKind,
    pub name: String,
}

/// Lifecycle service over an explicitly owned store.
pub struct EventLifecycle<R: KvRepository, C: Clock> {
    store: EventStore<R>,
    clock: C,
}

impl<R: KvRepository, C: Clock> EventLifecycle<R, C> {
    /// Opens the store behind `repo` (fail-soft) and wraps it.
    pub fn open(repo: R, clock: C) -> Self {
        Self::new(EventStore::open(repo), clock)
    }

    pub fn new(store: EventStore<R>, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &EventStore<R> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EventStore<R> {
        &mut self.store
    }

    pub fn into_store(self) -> EventStore<R> {
        self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Creates one event from form input.
    ///
    /// # Contract
    /// - Assigns a fresh unique id and `createdAt = clock.now()`.
    /// - Letters additionally unlock `letter_sent`.
    ///
    /// # Errors
    /// - `LifecycleError::Validation` for rejected input; nothing changes.
    pub fn create_event(&mut self, draft: &EventDraft) -> LifecycleResult<Event> {
        let created_at = self.clock.now();
        let id = self.fresh_id();
        let event = Event::from_draft(id, draft, created_at).map_err(|err| {
            warn!(
                "event=event_create module=lifecycle status=error type={} error_code=validation error={}",
                draft.event_type, err
            );
            LifecycleError::from(err)
        })?;

        let mut effects = vec![LifecycleEffect::EventCreated {
            id: event.id().clone(),
            event_type: event.event_type(),
        }];
        let state = self.store.state_mut();
        state.events.push(event.clone());
        if event.event_type() == EventType::Letter
            && state.achievements.unlock(AchievementKey::LetterSent)
        {
            effects.push(LifecycleEffect::AchievementUnlocked {
                key: AchievementKey::LetterSent,
            });
        }

        Ok(self.commit("event_create", event, effects))
    }

    /// Sets track progress, clamped to `0..=100`.
    ///
    /// # Errors
    /// - `NotFound` for unknown ids, `NotTrack` for other event types.
    pub fn update_progress(&mut self, id: &EventId, progress: i64) -> LifecycleResult<Event> {
        let change = {
            let event = self.event_mut(id, "event_progress")?;
            event
                .set_progress(progress)
                .map_err(|err| track_error(id, err))?
        };
        self.finish_track_edit("event_progress", id, change)
    }

    /// Flips one milestone and recomputes progress from the checklist.
    ///
    /// # Errors
    /// - `NotFound`, `NotTrack`, or `MilestoneIndexOutOfRange`.
    pub fn toggle_milestone(&mut self, id: &EventId, index: usize) -> LifecycleResult<Event> {
        let change = {
            let event = self.event_mut(id, "milestone_toggle")?;
            event
                .toggle_milestone(index)
                .map_err(|err| track_error(id, err))?
        };
        self.finish_track_edit("milestone_toggle", id, change)
    }

    /// Marks an event completed. Idempotent; repeat calls change nothing.
    pub fn mark_completed(&mut self, id: &EventId) -> LifecycleResult<Event> {
        let changed = self.event_mut(id, "event_complete")?.mark_completed();
        let event = self.snapshot_event(id)?;
        if !changed {
            return Ok(Mutation::unchanged(event));
        }
        let effects = vec![LifecycleEffect::MarkedCompleted { id: id.clone() }];
        Ok(self.commit("event_complete", event, effects))
    }

    /// Removes one event.
    ///
    /// # Errors
    /// - `NotFound` when the id is unknown.
    pub fn delete_event(&mut self, id: &EventId) -> LifecycleResult<Event> {
        let events = &mut self.store.state_mut().events;
        let Some(position) = events.iter().position(|event| event.id() == id) else {
            warn!("event=event_delete module=lifecycle status=error error_code=not_found");
            return Err(LifecycleError::NotFound(id.clone()));
        };
        let removed = events.remove(position);
        let effects = vec![LifecycleEffect::EventDeleted { id: id.clone() }];
        Ok(self.commit("event_delete", removed, effects))
    }

    /// Records today's presence. Returns `false` when already checked in today.
    pub fn check_in(&mut self) -> Mutation<bool> {
        let now = self.clock.now();
        let today = now.date_naive();
        let already = self
            .store
            .state()
            .check_ins
            .iter()
            .any(|at| at.with_timezone(now.offset()).date_naive() == today);
        if already {
            return Mutation::unchanged(false);
        }
        self.store.state_mut().check_ins.push(now);
        self.commit("check_in", true, vec![LifecycleEffect::CheckedIn { at: now }])
    }

    /// Replaces all settings at once.
    pub fn update_settings(&mut self, settings: Settings) -> Mutation<Settings> {
        let settings = settings.normalized();
        self.store.state_mut().settings = settings.clone();
        self.commit("settings_update", settings, Vec::new())
    }

    /// Clears everything and re-arms the first-run guide.
    pub fn clear_all(&mut self) -> Mutation<()> {
        let mut bulk = self.store.begin_bulk();
        bulk.clear();
        let save_error = bulk.commit().err();
        log_bulk("bulk_clear", save_error.as_ref());
        Mutation {
            value: (),
            effects: Vec::new(),
            save_error,
        }
    }

    /// Merges an exported payload into the current state.
    ///
    /// # Errors
    /// - `ParseError::InvalidFormat`; current state stays untouched.
    pub fn import_data(&mut self, bytes: &[u8]) -> Result<Mutation<TypeCounts>, ParseError> {
        let mut bulk = self.store.begin_bulk();
        if let Err(err) = bulk.import(bytes, self.clock.now()) {
            warn!(
                "event=bulk_import module=lifecycle status=error error_code=invalid_format bytes={}",
                bytes.len()
            );
            return Err(err);
        }
        let unlocked = refresh_achievements(bulk.state_mut(), self.clock.now().offset());
        let counts = bulk.state().type_counts();
        let save_error = bulk.commit().err();
        log_bulk("bulk_import", save_error.as_ref());
        Ok(Mutation {
            value: counts,
            effects: unlock_effects(unlocked),
            save_error,
        })
    }

    /// Replaces the whole state (e.g. a sample data set).
    ///
    /// # Errors
    /// - `StateValidationError` for blank or duplicate ids; nothing changes.
    pub fn replace_state(&mut self, state: AppState) -> Result<Mutation<()>, StateValidationError> {
        let mut bulk = self.store.begin_bulk();
        bulk.replace_state(state)?;
        let unlocked = refresh_achievements(bulk.state_mut(), self.clock.now().offset());
        let save_error = bulk.commit().err();
        log_bulk("bulk_replace", save_error.as_ref());
        Ok(Mutation {
            value: (),
            effects: unlock_effects(unlocked),
            save_error,
        })
    }

    /// Explicit retry of a failed save.
    pub fn save(&mut self) -> StorageResult<()> {
        self.store.save()
    }

    /// Timer/teardown save; suppressed around bulk replaces.
    pub fn autosave(&mut self) -> AutosaveOutcome {
        self.store.autosave()
    }

    pub fn export(&self) -> StorageResult<Vec<u8>> {
        self.store.export()
    }

    pub fn export_file_name(&self) -> String {
        export_file_name(self.clock.now())
    }

    /// First-run guide shows only for an empty, never-dismissed store.
    pub fn should_show_welcome(&self) -> bool {
        self.store.state().events.is_empty() && !self.store.welcome_dismissed()
    }

    pub fn dismiss_welcome(&self) -> StorageResult<()> {
        self.store.dismiss_welcome()
    }

    /// Events in insertion order, optionally filtered by type.
    pub fn list_events(&self, filter: Option<EventType>) -> Vec<&Event> {
        self.store
            .state()
            .events
            .iter()
            .filter(|event| filter.map_or(true, |wanted| event.event_type() == wanted))
            .collect()
    }

    pub fn get_event(&self, id: &EventId) -> Option<&Event> {
        self.store.state().find_event(id)
    }

    pub fn achievements(&self) -> &AchievementBook {
        &self.store.state().achievements
    }

    pub fn settings(&self) -> &Settings {
        &self.store.state().settings
    }

    pub fn check_ins(&self) -> &[DateTime<FixedOffset>] {
        &self.store.state().check_ins
    }

    pub fn type_counts(&self) -> TypeCounts {
        self.store.state().type_counts()
    }

    /// Countdown to an event's date; `None` for unknown ids or bad dates.
    pub fn countdown_for(&self, id: &EventId) -> Option<Countdown> {
        let now = self.clock.now();
        let target = self.get_event(id)?.target_time(now.offset())?;
        Some(countdown(target, now))
    }

    /// Events that deserve a reminder at the current instant.
    pub fn due_reminders(&self) -> Vec<Reminder> {
        let now = self.clock.now();
        let window_start = now + Duration::hours(23);
        let window_end = now + Duration::hours(24);

        self.store
            .state()
            .events
            .iter()
            .filter_map(|event| {
                let target = event.target_time(now.offset())?;
                let kind = if event.event_type() == EventType::Letter && target <= now {
                    ReminderKind::LetterReady
                } else if target > window_start && target <= window_end {
                    ReminderKind::EventApproaching
                } else {
                    return None;
                };
                Some(Reminder {
                    id: event.id().clone(),
                    kind,
                    name: event.name.clone(),
                })
            })
            .collect()
    }

    fn fresh_id(&self) -> EventId {
        loop {
            let id = EventId::generate();
            if !self.store.state().contains_event(&id) {
                return id;
            }
        }
    }

    fn event_mut(&mut self, id: &EventId, operation: &str) -> Result<&mut Event, LifecycleError> {
        match self.store.state_mut().find_event_mut(id) {
            Some(event) => Ok(event),
            None => {
                warn!("event={operation} module=lifecycle status=error error_code=not_found");
                Err(LifecycleError::NotFound(id.clone()))
            }
        }
    }

    fn snapshot_event(&self, id: &EventId) -> Result<Event, LifecycleError> {
        self.get_event(id)
            .cloned()
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))
    }

    fn finish_track_edit(
        &mut self,
        operation: &str,
        id: &EventId,
        change: ProgressChange,
    ) -> LifecycleResult<Event> {
        let mut effects = Vec::new();
        if change.crossed_half() {
            effects.push(LifecycleEffect::ProgressCrossedHalf { id: id.clone() });
        }
        if change.reached_completion() {
            effects.push(LifecycleEffect::ReachedCompletion { id: id.clone() });
            if let Some(event) = self.store.state_mut().find_event_mut(id) {
                event.mark_completed();
            }
        }

        let event = self.snapshot_event(id)?;
        info!(
            "event={} module=lifecycle status=ok old_progress={} new_progress={}",
            operation, change.old, change.new
        );
        Ok(self.commit(operation, event, effects))
    }

    fn commit<T>(
        &mut self,
        operation: &str,
        value: T,
        mut effects: Vec<LifecycleEffect>,
    ) -> Mutation<T> {
        let now = self.clock.now();
        let unlocked = refresh_achievements(self.store.state_mut(), now.offset());
        effects.extend(unlock_effects(unlocked));
        let save_error = self.store.save().err();

        match &save_error {
            None => info!(
                "event={} module=lifecycle status=ok effects={} events={}",
                operation,
                effects.len(),
                self.store.state().events.len()
            ),
            Some(err) => warn!(
                "event={} module=lifecycle status=degraded error_code={} error={}",
                operation,
                err.code(),
                err
            ),
        }

        Mutation {
            value,
            effects,
            save_error,
        }
    }
}

fn track_error(id: &EventId, err: TrackEditError) -> LifecycleError {
    match err {
        TrackEditError::NotTrack(event_type) => LifecycleError::NotTrack {
            id: id.clone(),
            event_type,
        },
        TrackEditError::IndexOutOfRange { index, len } => LifecycleError::MilestoneIndexOutOfRange {
            id: id.clone(),
            index,
            len,
        },
    }
}

fn unlock_effects(keys: Vec<AchievementKey>) -> Vec<LifecycleEffect> {
    keys.into_iter()
        .map(|key| LifecycleEffect::AchievementUnlocked { key })
        .collect()
}

fn log_bulk(operation: &str, save_error: Option<&StorageError>) {
    match save_error {
        None => info!("event={operation} module=lifecycle status=ok"),
        Some(err) => warn!(
            "event={} module=lifecycle status=degraded error_code={} error={}",
            operation,
            err.code(),
            err
        ),
    }
}
