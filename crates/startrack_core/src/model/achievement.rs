//! Achievement badge model.
//!
//! # Responsibility
//! - Define the fixed badge catalog and its display metadata.
//! - Track which badges are unlocked.
//!
//! # Invariants
//! - The key set is fixed at compile time; unknown persisted keys are ignored.
//! - `unlocked` only transitions false -> true. No API re-locks a badge.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Badge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AchievementKey {
    FirstEvent,
    TenEvents,
    FirstComplete,
    Streak7,
    NightOwl,
    EarlyBird,
    LetterSent,
    Constellation,
}

impl AchievementKey {
    pub const ALL: [AchievementKey; 8] = [
        Self::FirstEvent,
        Self::TenEvents,
        Self::FirstComplete,
        Self::Streak7,
        Self::NightOwl,
        Self::EarlyBird,
        Self::LetterSent,
        Self::Constellation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstEvent => "first_event",
            Self::TenEvents => "ten_events",
            Self::FirstComplete => "first_complete",
            Self::Streak7 => "streak_7",
            Self::NightOwl => "night_owl",
            Self::EarlyBird => "early_bird",
            Self::LetterSent => "letter_sent",
            Self::Constellation => "constellation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FirstEvent => "Lift Off",
            Self::TenEvents => "Starfield",
            Self::FirstComplete => "Milestone",
            Self::Streak7 => "Persistence",
            Self::NightOwl => "Night Owl",
            Self::EarlyBird => "Early Bird",
            Self::LetterSent => "Time Courier",
            Self::Constellation => "Guardian Constellation",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FirstEvent => "Create your first event",
            Self::TenEvents => "Create 10 events",
            Self::FirstComplete => "Complete your first goal",
            Self::Streak7 => "Check in on 7 days",
            Self::NightOwl => "Create an event late at night",
            Self::EarlyBird => "Create an event early in the morning",
            Self::LetterSent => "Seal your first time letter",
            Self::Constellation => "Record 3 milestones to form a constellation",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::FirstEvent => "🚀",
            Self::TenEvents => "⭐",
            Self::FirstComplete => "🏆",
            Self::Streak7 => "🔥",
            Self::NightOwl => "🦉",
            Self::EarlyBird => "🐦",
            Self::LetterSent => "✉️",
            Self::Constellation => "🌌",
        }
    }
}

impl Display for AchievementKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire/display shape of one badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementRecord {
    pub id: &'static str,
    pub name: &'static str,
    pub desc: &'static str,
    pub icon: &'static str,
    pub unlocked: bool,
}

/// Unlock state for the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchievementBook {
    unlocked: BTreeSet<AchievementKey>,
}

impl AchievementBook {
    pub fn is_unlocked(&self, key: AchievementKey) -> bool {
        self.unlocked.contains(&key)
    }

    /// Unlocks one badge; returns `true` only on the locked -> unlocked edge.
    pub fn unlock(&mut self, key: AchievementKey) -> bool {
        self.unlocked.insert(key)
    }

    /// Folds another book in without re-locking anything.
    pub fn merge_monotonic(&mut self, other: &AchievementBook) {
        self.unlocked.extend(other.unlocked.iter().copied());
    }

    pub fn unlocked_keys(&self) -> impl Iterator<Item = AchievementKey> + '_ {
        self.unlocked.iter().copied()
    }

    pub fn unlocked_count(&self) -> usize {
        self.unlocked.len()
    }

    /// Full catalog in declaration order.
    pub fn records(&self) -> Vec<AchievementRecord> {
        AchievementKey::ALL
            .into_iter()
            .map(|key| AchievementRecord {
                id: key.as_str(),
                name: key.name(),
                desc: key.description(),
                icon: key.icon(),
                unlocked: self.is_unlocked(key),
            })
            .collect()
    }
}

impl Serialize for AchievementBook {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let records = self.records();
        let mut map = serializer.serialize_map(Some(records.len()))?;
        for record in &records {
            map.serialize_entry(record.id, record)?;
        }
        map.end()
    }
}

// Display text comes from the catalog, not from persisted data.
#[derive(Deserialize)]
struct PersistedRecord {
    #[serde(default)]
    unlocked: bool,
}

impl<'de> Deserialize<'de> for AchievementBook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, PersistedRecord>::deserialize(deserializer)?;
        let unlocked = raw
            .into_iter()
            .filter(|(_, record)| record.unlocked)
            .filter_map(|(key, _)| AchievementKey::parse(&key))
            .collect();
        Ok(Self { unlocked })
    }
}
