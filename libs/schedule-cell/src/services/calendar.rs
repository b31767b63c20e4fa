// libs/schedule-cell/src/services/calendar.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::models::{ScheduleDay, ScheduleError};

/// Display format for dates at the API boundary.
pub const DATE_FORMAT: &str = "%d/%m/%Y";
/// Display format for times at the API boundary, 12-hour with AM/PM.
pub const TIME_FORMAT: &str = "%-I:%M %p";

// Parsing accepts both padded and unpadded hours.
const TIME_PARSE_FORMAT: &str = "%I:%M %p";

pub fn parse_display_date(text: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| ScheduleError::InvalidDate(text.to_string()))
}

pub fn parse_display_time(text: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(text, TIME_PARSE_FORMAT)
        .map_err(|_| ScheduleError::InvalidTime(text.to_string()))
}

pub fn format_display_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_display_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Absolute UTC bounds for a display-date range: 00:00:00 on the first day
/// through 23:59:59 on the last. Canonical range filter for appointment
/// queries.
pub fn to_instant_range(
    from_text: &str,
    to_text: &str,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ScheduleError> {
    let from = parse_display_date(from_text)?;
    let to = parse_display_date(to_text)?;

    let start = from.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let end = to.and_hms_opt(23, 59, 59).unwrap().and_utc();

    Ok((start, end))
}

/// The absolute instant a display (date, time) pair refers to.
pub fn slot_instant(slot_date: &str, slot_time: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let date = parse_display_date(slot_date)?;
    let time = parse_display_time(slot_time)?;

    Ok(NaiveDateTime::new(date, time).and_utc())
}

/// Walks a calendar range one day at a time, both endpoints included.
#[derive(Debug)]
pub struct DaySequence {
    next: Option<NaiveDate>,
    last: NaiveDate,
}

/// Builds the day-by-day sequence covering `[from, to]`. The range is
/// validated up front; the sequence itself cannot fail or restart.
pub fn day_sequence(from: NaiveDate, to: NaiveDate) -> Result<DaySequence, ScheduleError> {
    if to < from {
        return Err(ScheduleError::InvalidRange {
            from: format_display_date(from),
            to: format_display_date(to),
        });
    }

    Ok(DaySequence { next: Some(from), last: to })
}

impl Iterator for DaySequence {
    type Item = ScheduleDay;

    fn next(&mut self) -> Option<ScheduleDay> {
        let date = self.next?;
        self.next = if date < self.last { date.succ_opt() } else { None };

        Some(ScheduleDay {
            day: date.format("%A").to_string(),
            date,
            display_date: format_display_date(date),
        })
    }
}

/// Serde adapter keeping optional rule times in the boundary display format.
pub mod display_time_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        match value {
            Some(time) => serializer.serialize_str(&time.format(super::TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where D: Deserializer<'de> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        match text {
            Some(text) => NaiveTime::parse_from_str(&text, super::TIME_PARSE_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
