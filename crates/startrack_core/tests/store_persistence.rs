use chrono::{DateTime, FixedOffset};
use startrack_core::db::open_db;
use startrack_core::store::codec::{APP_DATA_KEY, WELCOMED_KEY};
use startrack_core::{
    load_state, AchievementKey, AppState, AutosaveOutcome, Event, EventDraft, EventId,
    EventLifecycle, EventStore, EventType, FixedClock, InMemoryKvRepository, KvRepository,
    ParseError, Settings, SqliteKvRepository, StorageError,
};

fn at(text: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(text).unwrap()
}

fn clock() -> FixedClock {
    FixedClock::new(at("2026-03-10T06:15:00+08:00"))
}

fn seed<R: KvRepository>(service: &mut EventLifecycle<R, FixedClock>) -> EventId {
    service
        .create_event(&EventDraft::new(EventType::Capsule, "Concert", "2026-05-20T19:30"))
        .unwrap();
    let mut track = EventDraft::new(EventType::Track, "Learn piano", "2026-12-31");
    track.milestones = Some("scales\nfirst song".to_string());
    let track_id = service.create_event(&track).unwrap().value.id().clone();
    service.toggle_milestone(&track_id, 0).unwrap();
    let mut letter = EventDraft::new(EventType::Letter, "Future me", "2030-01-01");
    letter.description = "Did you keep playing?".to_string();
    letter.star_count = Some(4);
    service.create_event(&letter).unwrap();
    service.check_in();
    track_id
}

fn large_state(now: DateTime<FixedOffset>) -> AppState {
    let mut state = AppState::default();
    for index in 0..4 {
        let mut draft = EventDraft::new(EventType::Milestone, format!("big {index}"), "2025-01-01");
        draft.description = "x".repeat(2_000);
        state
            .events
            .push(Event::from_draft(EventId::generate(), &draft, now).unwrap());
    }
    state
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("startrack.sqlite3");

    let saved_state = {
        let conn = open_db(&path).unwrap();
        let mut service = EventLifecycle::open(SqliteKvRepository::new(&conn), clock());
        seed(&mut service);
        service.store().state().clone()
    };

    let conn = open_db(&path).unwrap();
    let reopened = EventStore::open(SqliteKvRepository::new(&conn));
    assert_eq!(reopened.state(), &saved_state);
    assert_eq!(reopened.state().events.len(), 3);
    assert!(reopened
        .state()
        .achievements
        .is_unlocked(AchievementKey::LetterSent));
}

#[test]
fn load_falls_back_to_default_on_malformed_blobs() {
    let repo = InMemoryKvRepository::new();
    assert_eq!(load_state(&repo), AppState::default());

    repo.set(APP_DATA_KEY, "{ not json").unwrap();
    assert_eq!(load_state(&repo), AppState::default());

    repo.set(APP_DATA_KEY, "[1, 2, 3]").unwrap();
    assert_eq!(load_state(&repo), AppState::default());

    let duplicated = r##"{
        "events": [
            { "id": "a", "type": "capsule", "name": "x", "date": "2026-01-01",
              "createdAt": "2026-01-01T00:00:00+08:00" },
            { "id": "a", "type": "milestone", "name": "y", "date": "2026-01-02",
              "createdAt": "2026-01-01T00:00:00+08:00" }
        ]
    }"##;
    repo.set(APP_DATA_KEY, duplicated).unwrap();
    assert_eq!(load_state(&repo), AppState::default());
}

#[test]
fn load_accepts_legacy_blob_shapes() {
    let repo = InMemoryKvRepository::new();
    let legacy = r##"{
        "events": [
            { "id": "1700000000000", "type": "track", "name": "Run", "date": "2026-04-01",
              "progress": 180, "milestones": [], "createdAt": "2026-01-01T23:00:00+08:00" },
            { "id": "1700000000001", "type": "letter", "name": "Hi", "date": "2027-01-01",
              "description": "hello", "starCount": 0, "createdAt": "2026-01-01T10:00:00+08:00" }
        ],
        "settings": { "musicVolume": "35", "voiceEnabled": true },
        "achievements": { "first_event": { "id": "first_event", "unlocked": true } }
    }"##;
    repo.set(APP_DATA_KEY, legacy).unwrap();

    let state = load_state(&repo);
    assert_eq!(state.events.len(), 2);
    assert_eq!(state.events[0].id().as_str(), "1700000000000");
    assert_eq!(state.events[0].progress(), Some(100));
    assert_eq!(state.events[1].star_count(), Some(1));
    assert_eq!(state.settings.music_volume, 35);
    assert!(state.settings.voice_enabled);
    assert!(state.settings.particles_enabled);
    assert!(state.achievements.is_unlocked(AchievementKey::FirstEvent));
}

#[test]
fn export_then_import_reproduces_state() {
    let source_repo = InMemoryKvRepository::new();
    let mut source = EventLifecycle::open(&source_repo, clock());
    seed(&mut source);
    let exported = source.export().unwrap();

    let target_repo = InMemoryKvRepository::new();
    let mut target = EventLifecycle::open(&target_repo, clock());
    let imported = target.import_data(&exported).unwrap();
    assert!(imported.save_error.is_none());
    assert_eq!(imported.value.total(), 3);
    assert_eq!(imported.value.letter, 1);

    assert_eq!(target.store().state(), source.store().state());
    assert_eq!(load_state(&target_repo), *source.store().state());
}

#[test]
fn import_merges_present_fields_and_ignores_unknown_keys() {
    let repo = InMemoryKvRepository::new();
    let mut service = EventLifecycle::open(&repo, clock());
    seed(&mut service);
    let events_before = service.store().state().events.clone();

    let payload = br#"{
        "settings": { "musicVolume": 80, "timezone": "Europe/Paris" },
        "achievements": { "streak_7": { "unlocked": true }, "first_event": { "unlocked": false } },
        "theme": "dark"
    }"#;
    service.import_data(payload).unwrap();

    let state = service.store().state();
    assert_eq!(state.events, events_before);
    assert_eq!(state.settings.music_volume, 80);
    assert_eq!(state.settings.timezone, "Europe/Paris");
    assert!(state.achievements.is_unlocked(AchievementKey::Streak7));
    assert!(state.achievements.is_unlocked(AchievementKey::FirstEvent));
    assert!(!service.store().is_autosave_suppressed());
}

#[test]
fn import_stamps_missing_created_at_with_clock_time() {
    let repo = InMemoryKvRepository::new();
    let mut service = EventLifecycle::open(&repo, clock());

    let payload = br#"{ "events": [ { "id": "1700000000000", "type": "capsule",
        "name": "Trip", "date": "2026-08-01" } ] }"#;
    let imported = service.import_data(payload).unwrap();
    assert_eq!(imported.value.capsule, 1);

    let events = service.list_events(None);
    assert_eq!(events[0].created_at(), at("2026-03-10T06:15:00+08:00"));
    assert!(service.achievements().is_unlocked(AchievementKey::EarlyBird));
    assert_eq!(load_state(&repo).events[0].created_at(), events[0].created_at());
}

#[test]
fn invalid_import_leaves_state_untouched() {
    let repo = InMemoryKvRepository::new();
    let mut service = EventLifecycle::open(&repo, clock());
    seed(&mut service);
    let before = service.store().state().clone();

    for payload in [
        &b"not json"[..],
        &b"[]"[..],
        &br#"{ "events": "nope" }"#[..],
        &br#"{ "events": [ { "id": "", "type": "capsule", "name": "x", "date": "2026-01-01", "createdAt": "2026-01-01T00:00:00Z" } ] }"#[..],
    ] {
        let err = service.import_data(payload).unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
        assert_eq!(service.store().state(), &before);
        assert!(!service.store().is_autosave_suppressed());
    }
}

#[test]
fn clear_all_resets_state_and_welcome_flag() {
    let repo = InMemoryKvRepository::new();
    let mut service = EventLifecycle::open(&repo, clock());
    assert!(service.should_show_welcome());
    service.dismiss_welcome().unwrap();
    assert!(!service.should_show_welcome());
    seed(&mut service);

    let cleared = service.clear_all();
    assert!(cleared.save_error.is_none());
    assert!(service.list_events(None).is_empty());
    assert_eq!(service.achievements().unlocked_count(), 0);
    assert_eq!(repo.get(WELCOMED_KEY).unwrap(), None);
    assert!(service.should_show_welcome());
    assert_eq!(load_state(&repo), AppState::default());
}

#[test]
fn dropped_bulk_operation_rolls_back() {
    let repo = InMemoryKvRepository::new();
    let mut service = EventLifecycle::open(&repo, clock());
    seed(&mut service);
    let mut store = service.into_store();
    let before = store.state().clone();

    {
        let mut bulk = store.begin_bulk();
        bulk.clear();
        assert!(bulk.state().events.is_empty());
    }

    assert_eq!(store.state(), &before);
    assert!(!store.is_autosave_suppressed());
    assert!(matches!(store.autosave(), AutosaveOutcome::Saved));
}

#[test]
fn failed_bulk_commit_keeps_autosave_suppressed_until_a_save_succeeds() {
    let repo = InMemoryKvRepository::with_quota(4_096);
    let mut service = EventLifecycle::open(&repo, clock());

    let oversized = service.replace_state(large_state(at("2026-03-10T12:00:00+08:00")));
    let oversized = oversized.unwrap();
    assert!(matches!(
        oversized.save_error,
        Some(StorageError::QuotaExceeded { .. })
    ));
    assert_eq!(service.list_events(None).len(), 4);
    assert!(service.store().is_autosave_suppressed());
    assert!(matches!(service.autosave(), AutosaveOutcome::Suppressed));
    assert!(service.save().is_err());

    let small = service.replace_state(AppState::default()).unwrap();
    assert!(small.save_error.is_none());
    assert!(!service.store().is_autosave_suppressed());
    assert!(matches!(service.autosave(), AutosaveOutcome::Saved));
}

#[test]
fn replace_state_rejects_duplicate_ids_without_changes() {
    let repo = InMemoryKvRepository::new();
    let mut service = EventLifecycle::open(&repo, clock());
    seed(&mut service);
    let before = service.store().state().clone();

    let mut duplicated = before.clone();
    duplicated.events.push(before.events[0].clone());
    assert!(service.replace_state(duplicated).is_err());
    assert_eq!(service.store().state(), &before);
    assert!(!service.store().is_autosave_suppressed());
}

#[test]
fn sqlite_quota_rejects_oversized_state() {
    let conn = startrack_core::db::open_db_in_memory().unwrap();
    let repo = SqliteKvRepository::with_quota(&conn, 512);
    repo.set("small", "ok").unwrap();

    let err = repo.set(APP_DATA_KEY, &"y".repeat(1_024)).unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { quota_bytes: 512, .. }));
    assert_eq!(repo.get(APP_DATA_KEY).unwrap(), None);
    assert_eq!(repo.get("small").unwrap().as_deref(), Some("ok"));
}

#[test]
fn settings_update_is_normalized_and_persisted() {
    let repo = InMemoryKvRepository::new();
    let mut service = EventLifecycle::open(&repo, clock());

    let updated = service.update_settings(Settings {
        music_volume: 250,
        timezone: "  ".to_string(),
        particles_enabled: false,
        ..Settings::default()
    });
    assert_eq!(updated.value.music_volume, 100);
    assert_eq!(updated.value.timezone, "Asia/Shanghai");
    assert_eq!(load_state(&repo).settings, updated.value);
}

#[test]
fn export_file_name_carries_millisecond_timestamp() {
    let repo = InMemoryKvRepository::new();
    let service = EventLifecycle::open(&repo, clock());
    assert_eq!(
        service.export_file_name(),
        format!(
            "star-track-chronicles-{}.json",
            at("2026-03-10T06:15:00+08:00").timestamp_millis()
        )
    );
}
