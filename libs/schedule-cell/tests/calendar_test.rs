use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use schedule_cell::models::{ScheduleDay, ScheduleError};
use schedule_cell::services::calendar;

fn date(day: u32, month: u32, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[test]
fn test_day_sequence_covers_both_endpoints() {
    let days: Vec<ScheduleDay> =
        calendar::day_sequence(date(1, 9, 2026), date(7, 9, 2026)).unwrap().collect();

    assert_eq!(days.len(), 7);
    assert_eq!(days[0].display_date, "01/09/2026");
    assert_eq!(days[6].display_date, "07/09/2026");
}

#[test]
fn test_day_sequence_is_strictly_increasing() {
    let days: Vec<ScheduleDay> =
        calendar::day_sequence(date(25, 2, 2027), date(5, 3, 2027)).unwrap().collect();

    // Crosses the February boundary of a non-leap year.
    assert_eq!(days.len(), 9);
    for pair in days.windows(2) {
        assert_eq!(pair[1].date, pair[0].date.succ_opt().unwrap());
    }
}

#[test]
fn test_day_sequence_names_weekdays() {
    // 2026-09-07 is a Monday.
    let days: Vec<ScheduleDay> =
        calendar::day_sequence(date(7, 9, 2026), date(9, 9, 2026)).unwrap().collect();

    assert_eq!(days[0].day, "Monday");
    assert_eq!(days[1].day, "Tuesday");
    assert_eq!(days[2].day, "Wednesday");

    for day in &days {
        assert_eq!(day.day, day.date.format("%A").to_string());
    }
}

#[test]
fn test_day_sequence_single_day() {
    let days: Vec<ScheduleDay> =
        calendar::day_sequence(date(15, 6, 2026), date(15, 6, 2026)).unwrap().collect();

    assert_eq!(days.len(), 1);
    assert_eq!(days[0].display_date, "15/06/2026");
}

#[test]
fn test_day_sequence_rejects_inverted_range() {
    let result = calendar::day_sequence(date(10, 9, 2026), date(9, 9, 2026));
    assert_matches!(result, Err(ScheduleError::InvalidRange { .. }));
}

#[test]
fn test_display_date_round_trip() {
    let parsed = calendar::parse_display_date("21/07/2026").unwrap();
    assert_eq!(parsed, date(21, 7, 2026));
    assert_eq!(calendar::format_display_date(parsed), "21/07/2026");
}

#[test]
fn test_display_date_rejects_garbage() {
    assert_matches!(calendar::parse_display_date("2026-07-21"), Err(ScheduleError::InvalidDate(_)));
    assert_matches!(calendar::parse_display_date("32/01/2026"), Err(ScheduleError::InvalidDate(_)));
    assert_matches!(calendar::parse_display_date(""), Err(ScheduleError::InvalidDate(_)));
}

#[test]
fn test_display_time_round_trip() {
    let parsed = calendar::parse_display_time("9:05 AM").unwrap();
    assert_eq!(parsed, NaiveTime::from_hms_opt(9, 5, 0).unwrap());
    assert_eq!(calendar::format_display_time(parsed), "9:05 AM");
}

#[test]
fn test_display_time_accepts_padded_hours() {
    // Parsing is lenient about the leading zero; formatting never emits one.
    let padded = calendar::parse_display_time("09:05 AM").unwrap();
    let bare = calendar::parse_display_time("9:05 AM").unwrap();

    assert_eq!(padded, bare);
    assert_eq!(calendar::format_display_time(padded), "9:05 AM");
}

#[test]
fn test_display_time_handles_noon_and_midnight() {
    let noon = calendar::parse_display_time("12:00 PM").unwrap();
    let midnight = calendar::parse_display_time("12:00 AM").unwrap();

    assert_eq!(noon, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    assert_eq!(midnight, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    assert_eq!(calendar::format_display_time(noon), "12:00 PM");
    assert_eq!(calendar::format_display_time(midnight), "12:00 AM");
}

#[test]
fn test_display_time_rejects_garbage() {
    assert_matches!(calendar::parse_display_time("25:00 AM"), Err(ScheduleError::InvalidTime(_)));
    assert_matches!(calendar::parse_display_time("9:30"), Err(ScheduleError::InvalidTime(_)));
}

#[test]
fn test_instant_range_spans_whole_days() {
    let (start, end) = calendar::to_instant_range("01/09/2026", "03/09/2026").unwrap();

    assert_eq!(start, Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2026, 9, 3, 23, 59, 59).unwrap());
}

#[test]
fn test_slot_instant_combines_display_pair() {
    let instant = calendar::slot_instant("21/07/2026", "9:30 AM").unwrap();
    assert_eq!(instant, Utc.with_ymd_and_hms(2026, 7, 21, 9, 30, 0).unwrap());

    let afternoon = calendar::slot_instant("21/07/2026", "2:00 PM").unwrap();
    assert_eq!(afternoon, Utc.with_ymd_and_hms(2026, 7, 21, 14, 0, 0).unwrap());
}

#[test]
fn test_slot_instant_surfaces_bad_input() {
    assert_matches!(calendar::slot_instant("21/07/2026", "whenever"), Err(ScheduleError::InvalidTime(_)));
    assert_matches!(calendar::slot_instant("someday", "9:30 AM"), Err(ScheduleError::InvalidDate(_)));
}
