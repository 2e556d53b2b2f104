use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::error::{invalid_input_error, Error};

/// Quarter-hour labels covering the whole day, "00:00" through "23:45".
pub fn time_slots() -> Vec<String> {
    let mut slots = Vec::with_capacity(96);

    for hour in 0..24 {
        for quarter in 0..4 {
            slots.push(format!("{:02}:{:02}", hour, quarter * 15));
        }
    }

    slots
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn parse_time(value: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| invalid_input_error())
}

/// Time-of-day a signed number of minutes from now, wrapping across midnight.
pub fn time_with_offset(now: DateTime<Utc>, minutes: i64) -> NaiveTime {
    (now + Duration::minutes(minutes)).time()
}

pub fn is_future_time(time: NaiveTime, now: DateTime<Utc>) -> bool {
    time > now.time()
}

#[test]
fn test_time_slots_cover_the_day() {
    let slots = time_slots();

    assert_eq!(slots.len(), 96);
    assert_eq!(slots.first().unwrap(), "00:00");
    assert_eq!(slots.last().unwrap(), "23:45");
    assert_eq!(slots[5], "01:15");
}

#[test]
fn test_parse_and_format() {
    let parsed = parse_time("09:05").unwrap();
    assert_eq!(format_time(parsed), "09:05");

    assert!(parse_time("25:00").is_err());
    assert!(parse_time("not a time").is_err());
}

#[test]
fn test_offset_wraps_across_midnight() {
    use chrono::TimeZone;

    let late = Utc.with_ymd_and_hms(2024, 5, 6, 23, 30, 0).unwrap();
    assert_eq!(format_time(time_with_offset(late, 60)), "00:30");

    let early = Utc.with_ymd_and_hms(2024, 5, 6, 0, 15, 0).unwrap();
    assert_eq!(format_time(time_with_offset(early, -30)), "23:45");
}

#[test]
fn test_future_time_is_strict() {
    use chrono::TimeZone;

    let now = Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap();

    assert!(is_future_time(
        NaiveTime::from_hms_opt(10, 1, 0).unwrap(),
        now
    ));
    assert!(!is_future_time(
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        now
    ));
    assert!(!is_future_time(
        NaiveTime::from_hms_opt(9, 59, 0).unwrap(),
        now
    ));
}
