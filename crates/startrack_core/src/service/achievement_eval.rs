//! Achievement evaluator.
//!
//! # Responsibility
//! - Derive which badges the current state qualifies for.
//! - Fold qualifying badges into the unlock book monotonically.
//!
//! # Invariants
//! - `evaluate` is pure; each rule is independent of the others.
//! - `letter_sent` is not derived here. Letter creation unlocks it directly.
//! - Nothing here ever re-locks a badge.

use crate::model::achievement::{AchievementBook, AchievementKey};
use crate::model::event::EventType;
use crate::model::state::AppState;
use chrono::{FixedOffset, Timelike};
use std::collections::BTreeSet;
use std::ops::Range;

pub const TEN_EVENTS_THRESHOLD: usize = 10;
pub const STREAK_THRESHOLD: usize = 7;
pub const CONSTELLATION_THRESHOLD: usize = 3;
/// Local creation hours counted as "late night".
pub const NIGHT_OWL_HOURS: Range<u32> = 0..6;
/// Local creation hours counted as "early morning". Overlaps night at 05:xx.
pub const EARLY_BIRD_HOURS: Range<u32> = 5..9;

/// Returns every badge whose rule currently holds.
///
/// Creation hours are read in `local_offset`, whatever offset the stored
/// timestamp carries.
pub fn evaluate(state: &AppState, local_offset: &FixedOffset) -> BTreeSet<AchievementKey> {
    let mut keys = BTreeSet::new();
    let total = state.events.len();

    if total >= 1 {
        keys.insert(AchievementKey::FirstEvent);
    }
    if total >= TEN_EVENTS_THRESHOLD {
        keys.insert(AchievementKey::TenEvents);
    }
    if state.events.iter().any(|event| event.completed) {
        keys.insert(AchievementKey::FirstComplete);
    }
    if state.check_ins.len() >= STREAK_THRESHOLD {
        keys.insert(AchievementKey::Streak7);
    }
    if created_within(state, local_offset, &NIGHT_OWL_HOURS) {
        keys.insert(AchievementKey::NightOwl);
    }
    if created_within(state, local_offset, &EARLY_BIRD_HOURS) {
        keys.insert(AchievementKey::EarlyBird);
    }
    if state.type_counts().get(EventType::Milestone) >= CONSTELLATION_THRESHOLD {
        keys.insert(AchievementKey::Constellation);
    }

    keys
}

/// Unlocks `keys`; returns only the ones that were locked before.
pub fn apply_unlocks(
    book: &mut AchievementBook,
    keys: impl IntoIterator<Item = AchievementKey>,
) -> Vec<AchievementKey> {
    keys.into_iter().filter(|key| book.unlock(*key)).collect()
}

/// Evaluates and applies in one step.
pub fn refresh_achievements(
    state: &mut AppState,
    local_offset: &FixedOffset,
) -> Vec<AchievementKey> {
    let keys = evaluate(state, local_offset);
    apply_unlocks(&mut state.achievements, keys)
}

fn created_within(state: &AppState, local_offset: &FixedOffset, hours: &Range<u32>) -> bool {
    state.events.iter().any(|event| {
        let local = event.created_at().with_timezone(local_offset);
        hours.contains(&local.hour())
    })
}
