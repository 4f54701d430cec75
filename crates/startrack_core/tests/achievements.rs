use chrono::{DateTime, Duration, FixedOffset};
use startrack_core::{
    evaluate_achievements, AchievementKey, AppState, EventDraft, EventLifecycle, EventType,
    FixedClock, InMemoryKvRepository, LifecycleEffect,
};

fn at(text: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(text).unwrap()
}

fn lifecycle_at<'a>(
    repo: &'a InMemoryKvRepository,
    now: &str,
) -> EventLifecycle<&'a InMemoryKvRepository, FixedClock> {
    EventLifecycle::open(repo, FixedClock::new(at(now)))
}

fn shanghai() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

fn capsule(name: &str) -> EventDraft {
    EventDraft::new(EventType::Capsule, name, "2026-09-01")
}

fn unlock_count(effects: &[LifecycleEffect], key: AchievementKey) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, LifecycleEffect::AchievementUnlocked { key: k } if *k == key))
        .count()
}

#[test]
fn empty_state_qualifies_for_nothing() {
    assert!(evaluate_achievements(&AppState::default(), &shanghai()).is_empty());
}

#[test]
fn first_event_unlocks_on_first_create_only() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");

    let first = service.create_event(&capsule("one")).unwrap();
    assert_eq!(first.unlocked(), vec![AchievementKey::FirstEvent]);

    let second = service.create_event(&capsule("two")).unwrap();
    assert!(second.unlocked().is_empty());
}

#[test]
fn tenth_event_unlocks_ten_events_exactly_once() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");
    for index in 0..9 {
        service.create_event(&capsule(&format!("e{index}"))).unwrap();
    }
    assert!(!service.achievements().is_unlocked(AchievementKey::TenEvents));

    let tenth = service.create_event(&capsule("e9")).unwrap();
    assert_eq!(unlock_count(&tenth.effects, AchievementKey::TenEvents), 1);

    let eleventh = service.create_event(&capsule("e10")).unwrap();
    assert_eq!(unlock_count(&eleventh.effects, AchievementKey::TenEvents), 0);
}

#[test]
fn deleting_events_never_relocks_badges() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");
    let mut ids = Vec::new();
    for index in 0..10 {
        ids.push(
            service
                .create_event(&capsule(&format!("e{index}")))
                .unwrap()
                .value
                .id()
                .clone(),
        );
    }
    let before = service.achievements().clone();

    for id in &ids {
        service.delete_event(id).unwrap();
    }

    let after = service.achievements();
    for key in before.unlocked_keys() {
        assert!(after.is_unlocked(key), "{key} was re-locked");
    }
    assert!(after.is_unlocked(AchievementKey::TenEvents));
}

#[test]
fn letter_creation_unlocks_letter_sent() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");
    let mut draft = EventDraft::new(EventType::Letter, "To me", "2027-03-10");
    draft.description = "Remember this spring.".to_string();

    let created = service.create_event(&draft).unwrap();
    assert_eq!(unlock_count(&created.effects, AchievementKey::LetterSent), 1);
    assert!(service.achievements().is_unlocked(AchievementKey::LetterSent));

    // A state carrying letters is not enough on its own.
    let state = service.store().state().clone();
    assert!(!evaluate_achievements(&state, &shanghai()).contains(&AchievementKey::LetterSent));
}

#[test]
fn completion_paths_unlock_first_complete() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");
    let capsule_id = service
        .create_event(&capsule("exam"))
        .unwrap()
        .value
        .id()
        .clone();

    let marked = service.mark_completed(&capsule_id).unwrap();
    assert_eq!(unlock_count(&marked.effects, AchievementKey::FirstComplete), 1);

    let other = InMemoryKvRepository::new();
    let mut tracks = lifecycle_at(&other, "2026-03-10T14:00:00+08:00");
    let track_id = tracks
        .create_event(&EventDraft::new(EventType::Track, "Marathon", "2026-10-01"))
        .unwrap()
        .value
        .id()
        .clone();
    let done = tracks.update_progress(&track_id, 100).unwrap();
    assert_eq!(unlock_count(&done.effects, AchievementKey::FirstComplete), 1);
}

#[test]
fn creation_hour_drives_night_owl_and_early_bird() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T02:30:00+08:00");
    let night = service.create_event(&capsule("late")).unwrap();
    assert_eq!(unlock_count(&night.effects, AchievementKey::NightOwl), 1);
    assert_eq!(unlock_count(&night.effects, AchievementKey::EarlyBird), 0);

    // 05:xx counts for both.
    let overlap_repo = InMemoryKvRepository::new();
    let mut overlap = lifecycle_at(&overlap_repo, "2026-03-10T05:10:00+08:00");
    let both = overlap.create_event(&capsule("dawn")).unwrap();
    assert_eq!(unlock_count(&both.effects, AchievementKey::NightOwl), 1);
    assert_eq!(unlock_count(&both.effects, AchievementKey::EarlyBird), 1);

    let noon_repo = InMemoryKvRepository::new();
    let mut noon = lifecycle_at(&noon_repo, "2026-03-10T12:00:00+08:00");
    let neither = noon.create_event(&capsule("lunch")).unwrap();
    assert_eq!(unlock_count(&neither.effects, AchievementKey::NightOwl), 0);
    assert_eq!(unlock_count(&neither.effects, AchievementKey::EarlyBird), 0);
}

#[test]
fn imported_utc_creation_times_use_local_hours() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");

    // 02:00Z is 10:00 at +08:00.
    let daytime = br#"{"events":[{"id":"1700000000000","type":"capsule","name":"x",
        "date":"2026-02-01","createdAt":"2026-01-01T02:00:00.000Z"}]}"#;
    let imported = service.import_data(daytime).unwrap();
    assert_eq!(unlock_count(&imported.effects, AchievementKey::NightOwl), 0);
    assert!(!service.achievements().is_unlocked(AchievementKey::NightOwl));

    // 18:30Z is 02:30 the next day at +08:00.
    let late = br#"{"events":[{"id":"1700000000001","type":"capsule","name":"y",
        "date":"2026-02-01","createdAt":"2026-01-01T18:30:00.000Z"}]}"#;
    let imported = service.import_data(late).unwrap();
    assert_eq!(unlock_count(&imported.effects, AchievementKey::NightOwl), 1);
    assert!(service.achievements().is_unlocked(AchievementKey::NightOwl));
}

#[test]
fn third_milestone_event_forms_constellation() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");
    for name in ["graduated", "moved"] {
        let created = service
            .create_event(&EventDraft::new(EventType::Milestone, name, "2025-06-01"))
            .unwrap();
        assert_eq!(unlock_count(&created.effects, AchievementKey::Constellation), 0);
    }
    service.create_event(&capsule("not a milestone")).unwrap();
    assert!(!service.achievements().is_unlocked(AchievementKey::Constellation));

    let third = service
        .create_event(&EventDraft::new(EventType::Milestone, "married", "2026-01-01"))
        .unwrap();
    assert_eq!(unlock_count(&third.effects, AchievementKey::Constellation), 1);
}

#[test]
fn seven_daily_check_ins_unlock_streak() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T20:00:00+08:00");
    for day in 0..7 {
        let checked = service.check_in();
        assert!(checked.value);
        let expected = usize::from(day == 6);
        assert_eq!(unlock_count(&checked.effects, AchievementKey::Streak7), expected);
        service.clock().advance(Duration::days(1));
    }
    assert!(service.achievements().is_unlocked(AchievementKey::Streak7));
}

#[test]
fn records_list_full_catalog_in_order() {
    let repo = InMemoryKvRepository::new();
    let mut service = lifecycle_at(&repo, "2026-03-10T14:00:00+08:00");
    service.create_event(&capsule("one")).unwrap();

    let records = service.achievements().records();
    assert_eq!(records.len(), AchievementKey::ALL.len());
    assert_eq!(records[0].id, "first_event");
    assert!(records[0].unlocked);
    assert!(records.iter().skip(1).all(|record| !record.unlocked));
}
