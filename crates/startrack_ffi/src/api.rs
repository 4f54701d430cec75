//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Translate lifecycle effects into plain labels the UI maps to visuals.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Calls are serialized process-wide; each call opens the store, applies
//!   one operation and persists before returning.

use log::warn;
use startrack_core::db::open_db;
use startrack_core::{
    core_version as core_version_inner, countdown_from_str, init_logging as init_logging_inner,
    ping as ping_inner, AchievementRecord, Clock, CoreConfig, Countdown, Event, EventDraft,
    EventId, EventLifecycle, EventType, LifecycleResult, Mutation, Reminder, ReminderKind,
    Settings, SqliteKvRepository, SystemClock,
};
use std::sync::{Mutex, OnceLock, PoisonError};

static ENTRY_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
static ENTRY_LOCK: Mutex<()> = Mutex::new(());

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Checklist item of a track event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneItem {
    pub name: String,
    pub completed: bool,
}

/// Flattened event projection for list and detail views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventItem {
    pub event_id: String,
    /// `capsule|track|milestone|letter`.
    pub event_type: String,
    pub name: String,
    pub date: String,
    pub description: String,
    pub color: String,
    pub important: bool,
    pub completed: bool,
    /// Track only.
    pub progress: Option<u8>,
    pub milestones: Vec<MilestoneItem>,
    /// Letter only.
    pub star_count: Option<u8>,
    /// RFC 3339 creation instant.
    pub created_at: String,
    /// Countdown text at call time; empty when the date cannot be parsed.
    pub countdown: String,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventListResponse {
    pub items: Vec<EventItem>,
    pub message: String,
}

/// Generic action response envelope for mutation calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventActionResponse {
    /// Whether the operation was applied.
    pub ok: bool,
    /// Affected event ID, when the operation targets one event.
    pub event_id: Option<String>,
    /// Effect labels, e.g. `progress_crossed_half` or `reached_completion`.
    pub effects: Vec<String>,
    /// Newly unlocked achievement keys.
    pub unlocked: Vec<String>,
    /// `false` when the change is applied but could not be persisted.
    pub saved: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl EventActionResponse {
    fn from_mutation<T>(
        message: impl Into<String>,
        event_id: Option<String>,
        mutation: &Mutation<T>,
    ) -> Self {
        let mut message = message.into();
        if let Some(err) = &mutation.save_error {
            message = format!("{message} Not saved: {err}");
        }
        Self {
            ok: true,
            event_id,
            effects: mutation
                .effects
                .iter()
                .map(|effect| effect.label().to_string())
                .collect(),
            unlocked: mutation
                .unlocked()
                .into_iter()
                .map(|key| key.as_str().to_string())
                .collect(),
            saved: mutation.save_error.is_none(),
            message,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            event_id: None,
            effects: Vec::new(),
            unlocked: Vec::new(),
            saved: false,
            message: message.into(),
        }
    }
}

/// One badge of the achievement catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementItem {
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
}

/// Export payload and suggested download name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataExportResponse {
    pub ok: bool,
    pub file_name: String,
    pub json: String,
    pub message: String,
}

/// Countdown projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownItem {
    pub ok: bool,
    pub expired: bool,
    pub text: String,
}

/// Reminder the UI should surface now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderItem {
    pub event_id: String,
    /// `event_approaching|letter_ready`.
    pub kind: String,
    pub name: String,
}

/// Preference record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsItem {
    pub voice_enabled: bool,
    pub notifications_enabled: bool,
    pub particles_enabled: bool,
    pub music_volume: u8,
    pub timezone: String,
}

/// Lists events in creation order.
///
/// Input semantics:
/// - `event_type`: optional `capsule|track|milestone|letter`; `None` or
///   `all` lists everything.
#[flutter_rust_bridge::frb(sync)]
pub fn events_list(event_type: Option<String>) -> EventListResponse {
    let filter = match parse_type_filter(event_type.as_deref()) {
        Ok(filter) => filter,
        Err(message) => {
            return EventListResponse {
                items: Vec::new(),
                message,
            };
        }
    };

    match with_lifecycle(|lifecycle| {
        lifecycle
            .list_events(filter)
            .into_iter()
            .map(|event| to_event_item(event, lifecycle.countdown_for(event.id())))
            .collect::<Vec<_>>()
    }) {
        Ok(items) => {
            let message = if items.is_empty() {
                "No events.".to_string()
            } else {
                format!("Found {} event(s).", items.len())
            };
            EventListResponse { items, message }
        }
        Err(err) => EventListResponse {
            items: Vec::new(),
            message: format!("events_list failed: {err}"),
        },
    }
}

/// Creates one event from the creation form.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Returns operation result, created event ID and effect labels.
#[allow(clippy::too_many_arguments)]
#[flutter_rust_bridge::frb(sync)]
pub fn event_create(
    event_type: String,
    name: String,
    date: String,
    description: String,
    color: Option<String>,
    important: bool,
    progress: Option<i64>,
    milestones: Option<String>,
    star_count: Option<i64>,
) -> EventActionResponse {
    let Some(event_type) = EventType::parse(&event_type) else {
        return EventActionResponse::failure(format!(
            "event_create failed: unknown event type `{}`",
            event_type.trim()
        ));
    };
    let draft = EventDraft {
        event_type,
        name,
        date,
        description,
        color: color.filter(|value| !value.trim().is_empty()),
        important,
        progress,
        milestones,
        star_count,
    };

    match with_lifecycle(|lifecycle| lifecycle.create_event(&draft)) {
        Ok(Ok(mutation)) => EventActionResponse::from_mutation(
            "Event created.",
            Some(mutation.value.id().to_string()),
            &mutation,
        ),
        Ok(Err(err)) => EventActionResponse::failure(format!("event_create failed: {err}")),
        Err(err) => EventActionResponse::failure(format!("event_create failed: {err}")),
    }
}

/// Sets track progress; values outside `0..=100` are clamped.
#[flutter_rust_bridge::frb(sync)]
pub fn event_update_progress(event_id: String, progress: i64) -> EventActionResponse {
    with_event(
        "event_update_progress",
        "Progress updated.",
        &event_id,
        |lifecycle, id| lifecycle.update_progress(id, progress),
    )
}

/// Flips one milestone of a track event.
#[flutter_rust_bridge::frb(sync)]
pub fn event_toggle_milestone(event_id: String, index: u32) -> EventActionResponse {
    let index = usize::try_from(index).unwrap_or(usize::MAX);
    with_event(
        "event_toggle_milestone",
        "Milestone toggled.",
        &event_id,
        |lifecycle, id| lifecycle.toggle_milestone(id, index),
    )
}

/// Marks an event completed. Repeated calls succeed with no effects.
#[flutter_rust_bridge::frb(sync)]
pub fn event_mark_completed(event_id: String) -> EventActionResponse {
    with_event(
        "event_mark_completed",
        "Event completed.",
        &event_id,
        |lifecycle, id| lifecycle.mark_completed(id),
    )
}

/// Deletes one event.
#[flutter_rust_bridge::frb(sync)]
pub fn event_delete(event_id: String) -> EventActionResponse {
    with_event(
        "event_delete",
        "Event deleted.",
        &event_id,
        |lifecycle, id| lifecycle.delete_event(id),
    )
}

/// Records today's check-in.
#[flutter_rust_bridge::frb(sync)]
pub fn check_in() -> EventActionResponse {
    match with_lifecycle(|lifecycle| lifecycle.check_in()) {
        Ok(mutation) => {
            let message = if mutation.value {
                "Checked in."
            } else {
                "Already checked in today."
            };
            EventActionResponse::from_mutation(message, None, &mutation)
        }
        Err(err) => EventActionResponse::failure(format!("check_in failed: {err}")),
    }
}

/// Full achievement catalog with unlock flags, in display order.
#[flutter_rust_bridge::frb(sync)]
pub fn achievements_list() -> Vec<AchievementItem> {
    match with_lifecycle(|lifecycle| lifecycle.achievements().records()) {
        Ok(records) => records.into_iter().map(to_achievement_item).collect(),
        Err(err) => {
            warn!("event=achievements_list module=ffi status=error error={err}");
            Vec::new()
        }
    }
}

/// Exports the full state as pretty-printed JSON.
#[flutter_rust_bridge::frb(sync)]
pub fn data_export() -> DataExportResponse {
    let exported = with_lifecycle(|lifecycle| {
        lifecycle
            .export()
            .map(|bytes| (lifecycle.export_file_name(), bytes))
    });
    match exported {
        Ok(Ok((file_name, bytes))) => match String::from_utf8(bytes) {
            Ok(json) => DataExportResponse {
                ok: true,
                file_name,
                json,
                message: "Data exported.".to_string(),
            },
            Err(err) => export_failure(err.to_string()),
        },
        Ok(Err(err)) => export_failure(err.to_string()),
        Err(err) => export_failure(err),
    }
}

/// Merges a previously exported JSON document into the current data.
#[flutter_rust_bridge::frb(sync)]
pub fn data_import(json: String) -> EventActionResponse {
    match with_lifecycle(|lifecycle| lifecycle.import_data(json.as_bytes())) {
        Ok(Ok(mutation)) => EventActionResponse::from_mutation(
            format!("Imported {} event(s).", mutation.value.total()),
            None,
            &mutation,
        ),
        Ok(Err(err)) => EventActionResponse::failure(format!("data_import failed: {err}")),
        Err(err) => EventActionResponse::failure(format!("data_import failed: {err}")),
    }
}

/// Removes every event, check-in, setting and badge.
#[flutter_rust_bridge::frb(sync)]
pub fn data_clear() -> EventActionResponse {
    match with_lifecycle(|lifecycle| lifecycle.clear_all()) {
        Ok(mutation) => EventActionResponse::from_mutation("All data cleared.", None, &mutation),
        Err(err) => EventActionResponse::failure(format!("data_clear failed: {err}")),
    }
}

/// Current settings; defaults when the store cannot be opened.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_get() -> SettingsItem {
    match with_lifecycle(|lifecycle| lifecycle.settings().clone()) {
        Ok(settings) => to_settings_item(settings),
        Err(err) => {
            warn!("event=settings_get module=ffi status=error error={err}");
            to_settings_item(Settings::default())
        }
    }
}

/// Replaces all settings.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_update(settings: SettingsItem) -> EventActionResponse {
    let settings = Settings {
        voice_enabled: settings.voice_enabled,
        notifications_enabled: settings.notifications_enabled,
        particles_enabled: settings.particles_enabled,
        music_volume: settings.music_volume,
        timezone: settings.timezone,
    };
    match with_lifecycle(|lifecycle| lifecycle.update_settings(settings)) {
        Ok(mutation) => EventActionResponse::from_mutation("Settings saved.", None, &mutation),
        Err(err) => EventActionResponse::failure(format!("settings_update failed: {err}")),
    }
}

/// Whether the first-run guide should be shown.
#[flutter_rust_bridge::frb(sync)]
pub fn welcome_should_show() -> bool {
    with_lifecycle(|lifecycle| lifecycle.should_show_welcome()).unwrap_or(false)
}

/// Records that the first-run guide was dismissed. Returns an error message
/// or an empty string.
#[flutter_rust_bridge::frb(sync)]
pub fn welcome_dismiss() -> String {
    match with_lifecycle(|lifecycle| lifecycle.dismiss_welcome()) {
        Ok(Ok(())) => String::new(),
        Ok(Err(err)) => err.to_string(),
        Err(err) => err,
    }
}

/// Events that deserve a notification right now.
#[flutter_rust_bridge::frb(sync)]
pub fn reminders_due() -> Vec<ReminderItem> {
    match with_lifecycle(|lifecycle| lifecycle.due_reminders()) {
        Ok(reminders) => reminders.into_iter().map(to_reminder_item).collect(),
        Err(err) => {
            warn!("event=reminders_due module=ffi status=error error={err}");
            Vec::new()
        }
    }
}

/// Countdown from now to an arbitrary date string.
///
/// # FFI contract
/// - Pure; does not touch the store.
/// - `ok=false` when `target` cannot be parsed.
#[flutter_rust_bridge::frb(sync)]
pub fn countdown_text(target: String) -> CountdownItem {
    match countdown_from_str(&target, SystemClock.now()) {
        Some(countdown) => CountdownItem {
            ok: true,
            expired: countdown.expired,
            text: countdown.text,
        },
        None => CountdownItem {
            ok: false,
            expired: false,
            text: String::new(),
        },
    }
}

fn entry_config() -> &'static CoreConfig {
    ENTRY_CONFIG.get_or_init(CoreConfig::from_env)
}

fn with_lifecycle<T>(
    f: impl FnOnce(&mut EventLifecycle<SqliteKvRepository<'_>, SystemClock>) -> T,
) -> Result<T, String> {
    // Poisoning is ignored; every call reloads state from the store.
    let _guard = ENTRY_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let config = entry_config();
    let conn = open_db(&config.db_path).map_err(|err| format!("entry DB open failed: {err}"))?;
    let repo = SqliteKvRepository::with_quota(&conn, config.quota_bytes);
    let mut lifecycle = EventLifecycle::open(repo, SystemClock);
    Ok(f(&mut lifecycle))
}

fn with_event(
    operation: &str,
    message: &str,
    event_id: &str,
    f: impl FnOnce(
        &mut EventLifecycle<SqliteKvRepository<'_>, SystemClock>,
        &EventId,
    ) -> LifecycleResult<Event>,
) -> EventActionResponse {
    let Some(id) = EventId::parse(event_id) else {
        return EventActionResponse::failure(format!("{operation} failed: event_id is blank"));
    };
    match with_lifecycle(|lifecycle| f(lifecycle, &id)) {
        Ok(Ok(mutation)) => {
            EventActionResponse::from_mutation(message, Some(id.to_string()), &mutation)
        }
        Ok(Err(err)) => EventActionResponse::failure(format!("{operation} failed: {err}")),
        Err(err) => EventActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn parse_type_filter(raw: Option<&str>) -> Result<Option<EventType>, String> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => EventType::parse(value)
            .map(Some)
            .ok_or_else(|| format!("events_list failed: unknown event type `{value}`")),
    }
}

fn to_event_item(event: &Event, countdown: Option<Countdown>) -> EventItem {
    EventItem {
        event_id: event.id().to_string(),
        event_type: event.event_type().as_str().to_string(),
        name: event.name.clone(),
        date: event.date.clone(),
        description: event.description.clone(),
        color: event.color.clone(),
        important: event.important,
        completed: event.completed,
        progress: event.progress(),
        milestones: event
            .milestones()
            .iter()
            .map(|milestone| MilestoneItem {
                name: milestone.name.clone(),
                completed: milestone.completed,
            })
            .collect(),
        star_count: event.star_count(),
        created_at: event.created_at().to_rfc3339(),
        countdown: countdown.map(|countdown| countdown.text).unwrap_or_default(),
    }
}

fn to_achievement_item(record: AchievementRecord) -> AchievementItem {
    AchievementItem {
        key: record.id.to_string(),
        name: record.name.to_string(),
        description: record.desc.to_string(),
        icon: record.icon.to_string(),
        unlocked: record.unlocked,
    }
}

fn to_reminder_item(reminder: Reminder) -> ReminderItem {
    ReminderItem {
        event_id: reminder.id.to_string(),
        kind: reminder_kind_label(reminder.kind).to_string(),
        name: reminder.name,
    }
}

fn reminder_kind_label(kind: ReminderKind) -> &'static str {
    match kind {
        ReminderKind::EventApproaching => "event_approaching",
        ReminderKind::LetterReady => "letter_ready",
    }
}

fn to_settings_item(settings: Settings) -> SettingsItem {
    SettingsItem {
        voice_enabled: settings.voice_enabled,
        notifications_enabled: settings.notifications_enabled,
        particles_enabled: settings.particles_enabled,
        music_volume: settings.music_volume,
        timezone: settings.timezone,
    }
}

fn export_failure(message: String) -> DataExportResponse {
    DataExportResponse {
        ok: false,
        file_name: String::new(),
        json: String::new(),
        message: format!("data_export failed: {message}"),
    }
}
