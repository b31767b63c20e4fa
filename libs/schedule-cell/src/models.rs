// libs/schedule-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::fmt;
use thiserror::Error;

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

/// A practitioner's recurring availability for one month and speciality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub speciality: String,
    pub year: i32,
    pub month: u32,
    pub recurrence: RecurrenceType,
    /// Weekday/date tokens joined by `||`, deduplicated on upsert.
    pub slot_days: String,
    pub slot_schedule: Vec<DaySlotRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Weekly,
    Monthly,
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceType::Weekly => write!(f, "weekly"),
            RecurrenceType::Monthly => write!(f, "monthly"),
        }
    }
}

/// One working window inside a schedule. Monthly rules carry the concrete
/// date they fire on; weekly rules are matched by weekday name alone.
/// A rule missing either boundary time is inert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySlotRule {
    pub day: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none",
            with = "crate::services::calendar::display_time_opt")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none",
            with = "crate::services::calendar::display_time_opt")]
    pub end_time: Option<NaiveTime>,
}

impl DaySlotRule {
    pub fn working_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertScheduleRequest {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub speciality: String,
    pub year: i32,
    pub month: u32,
    pub recurrence: RecurrenceType,
    pub slot_days: String,
    pub slot_schedule: Vec<DaySlotRule>,
}

impl UpsertScheduleRequest {
    /// Materialize the schedule row this request describes before it is
    /// persisted. Reconciliation expands the candidate to learn which
    /// bookings the new windows still cover; the nil id marks it unsaved.
    pub fn as_candidate(&self) -> DoctorSchedule {
        DoctorSchedule {
            id: Uuid::nil(),
            doctor_id: self.doctor_id,
            doctor_name: self.doctor_name.clone(),
            speciality: self.speciality.clone(),
            year: self.year,
            month: self.month,
            recurrence: self.recurrence,
            slot_days: self.slot_days.clone(),
            slot_schedule: self.slot_schedule.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// A concrete bookable instant derived from a schedule. Never persisted;
/// appointments reference it by value through (doctor_id, slot_date,
/// slot_time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_day: String,
    /// Display date, DD/MM/YYYY.
    pub slot_date: String,
    /// Display time, 12-hour h:mm AM/PM.
    pub slot_time: String,
    pub slot_duration: i64,
    pub slot_duration_unit: DurationUnit,
    pub speciality: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Minutes,
    Hours,
}

impl DurationUnit {
    pub fn as_duration(&self, count: i64) -> Duration {
        match self {
            DurationUnit::Minutes => Duration::minutes(count),
            DurationUnit::Hours => Duration::hours(count),
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationUnit::Minutes => write!(f, "minutes"),
            DurationUnit::Hours => write!(f, "hours"),
        }
    }
}

/// Global slot granularity. Falls back to defaults when the store holds no
/// settings row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingSettings {
    pub slot_duration: i64,
    pub slot_duration_unit: DurationUnit,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            slot_duration: 30,
            slot_duration_unit: DurationUnit::Minutes,
        }
    }
}

/// One calendar day inside an enumerated range.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDay {
    /// Full weekday name, e.g. "Monday".
    pub day: String,
    pub date: NaiveDate,
    /// Display date, DD/MM/YYYY.
    pub display_date: String,
}

#[derive(Debug, Clone)]
pub enum SlotScope {
    Speciality(String),
    Doctor(Uuid),
}

#[derive(Debug, Clone)]
pub struct FreeSlotQuery {
    pub scope: SlotScope,
    pub from_date: String,
    pub to_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreeSlotsResponse {
    pub count: usize,
    pub slots: Vec<Slot>,
}

/// Minimal view of a booked appointment row, enough for slot subtraction.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedSlot {
    pub doctor_id: Uuid,
    pub slot_day: String,
    pub slot_date: String,
    pub slot_time: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid date range: {to} is before {from}")]
    InvalidRange { from: String, to: String },

    #[error("Invalid date '{0}', expected DD/MM/YYYY")]
    InvalidDate(String),

    #[error("Invalid time '{0}', expected h:mm AM/PM")]
    InvalidTime(String),

    #[error("Schedule not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
