//! Countdown and date helpers.
//!
//! # Responsibility
//! - Parse the ISO-8601 variants users enter for event dates.
//! - Bucket a remaining duration into a coarse human-readable countdown.
//!
//! # Invariants
//! - All functions are pure in `(target, now)`.
//! - Resolution stops at minutes; seconds are never displayed.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::Serialize;

pub const EXPIRED_TEXT: &str = "Arrived";

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Coarsest applicable unit pair for a remaining duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum CountdownParts {
    DaysHours { days: i64, hours: i64 },
    HoursMinutes { hours: i64, minutes: i64 },
    Minutes { minutes: i64 },
}

/// Display-ready countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub expired: bool,
    pub text: String,
    /// `None` once expired.
    pub parts: Option<CountdownParts>,
}

/// Computes the countdown from `now` to `target`.
///
/// `target <= now` is expired. Otherwise the remaining time is reported as
/// days+hours (>= 1 day), hours+minutes (>= 1 hour) or minutes.
pub fn countdown(target: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> Countdown {
    if target <= now {
        return Countdown {
            expired: true,
            text: EXPIRED_TEXT.to_string(),
            parts: None,
        };
    }

    let total_minutes = (target - now).num_minutes();
    let parts = if total_minutes >= MINUTES_PER_DAY {
        CountdownParts::DaysHours {
            days: total_minutes / MINUTES_PER_DAY,
            hours: (total_minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR,
        }
    } else if total_minutes >= MINUTES_PER_HOUR {
        CountdownParts::HoursMinutes {
            hours: total_minutes / MINUTES_PER_HOUR,
            minutes: total_minutes % MINUTES_PER_HOUR,
        }
    } else {
        CountdownParts::Minutes {
            minutes: total_minutes,
        }
    };

    Countdown {
        expired: false,
        text: format_parts(parts),
        parts: Some(parts),
    }
}

/// Parses `target` and computes its countdown; `None` when unparseable.
///
/// Offset-less targets are read in `now`'s offset.
pub fn countdown_from_str(target: &str, now: DateTime<FixedOffset>) -> Option<Countdown> {
    parse_timestamp(target, now.offset()).map(|target| countdown(target, now))
}

/// Parses an event date.
///
/// Accepts RFC 3339 with an offset, `YYYY-MM-DDTHH:MM[:SS[.fff]]` and
/// `YYYY-MM-DD`. Offset-less forms are interpreted in `local_offset`; a bare
/// date means local midnight.
pub fn parse_timestamp(value: &str, local_offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed);
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    local_offset.from_local_datetime(&naive).single()
}

fn format_parts(parts: CountdownParts) -> String {
    match parts {
        CountdownParts::DaysHours { days, hours } => {
            format!("{} {}", unit(days, "day"), unit(hours, "hour"))
        }
        CountdownParts::HoursMinutes { hours, minutes } => {
            format!("{} {}", unit(hours, "hour"), unit(minutes, "minute"))
        }
        CountdownParts::Minutes { minutes } => unit(minutes, "minute"),
    }
}

fn unit(value: i64, singular: &str) -> String {
    if value == 1 {
        format!("{value} {singular}")
    } else {
        format!("{value} {singular}s")
    }
}

#[cfg(test)]
mod tests {
    use super::{countdown, countdown_from_str, parse_timestamp, CountdownParts, EXPIRED_TEXT};
    use chrono::{DateTime, Duration, FixedOffset};

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-01-10T12:00:00+08:00").unwrap()
    }

    #[test]
    fn twenty_five_hours_reports_days_and_hours() {
        let result = countdown(now() + Duration::hours(25), now());
        assert!(!result.expired);
        assert_eq!(result.text, "1 day 1 hour");
        assert_eq!(
            result.parts,
            Some(CountdownParts::DaysHours { days: 1, hours: 1 })
        );
    }

    #[test]
    fn sub_day_reports_hours_and_minutes() {
        let result = countdown(now() + Duration::minutes(5 * 60 + 7), now());
        assert_eq!(result.text, "5 hours 7 minutes");
    }

    #[test]
    fn sub_hour_reports_minutes_without_seconds() {
        let result = countdown(now() + Duration::seconds(59 * 60 + 59), now());
        assert_eq!(result.text, "59 minutes");
        assert_eq!(result.parts, Some(CountdownParts::Minutes { minutes: 59 }));
    }

    #[test]
    fn target_equal_to_now_is_expired() {
        let result = countdown(now(), now());
        assert!(result.expired);
        assert_eq!(result.text, EXPIRED_TEXT);
        assert_eq!(result.parts, None);

        assert!(countdown(now() - Duration::days(3), now()).expired);
    }

    #[test]
    fn parse_timestamp_reads_naive_values_in_local_offset() {
        let offset = *now().offset();
        let naive = parse_timestamp("2026-01-11T12:00", &offset).unwrap();
        assert_eq!(naive, now() + Duration::days(1));

        let date_only = parse_timestamp("2026-01-11", &offset).unwrap();
        assert_eq!(date_only, now() + Duration::hours(12));

        let zulu = parse_timestamp("2026-01-10T04:00:00.000Z", &offset).unwrap();
        assert_eq!(zulu, now());

        assert!(parse_timestamp("next tuesday", &offset).is_none());
        assert!(parse_timestamp("   ", &offset).is_none());
    }

    #[test]
    fn countdown_from_str_rejects_garbage() {
        assert!(countdown_from_str("soon", now()).is_none());
        let parsed = countdown_from_str("2026-01-10T12:30:00", now()).unwrap();
        assert_eq!(parsed.text, "30 minutes");
    }
}
