// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use schedule_cell::models::{DoctorSchedule, DurationUnit, ScheduleError};

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

/// A visit booked onto one slot. Appointment rows are never deleted;
/// cancelling and rescheduling are status transitions, so the full booking
/// history stays queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub speciality: String,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub patient_record_id: String,
    pub visit_id: Uuid,
    pub location_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_worker_id: Option<Uuid>,
    /// Full weekday name of the slot, e.g. "Monday".
    pub slot_day: String,
    /// Display date, DD/MM/YYYY.
    pub slot_date: String,
    /// Display time, 12-hour h:mm AM/PM.
    pub slot_time: String,
    pub slot_duration: i64,
    pub slot_duration_unit: DurationUnit,
    /// Absolute instant derived from slot_date + slot_time. Range queries
    /// filter on this column, never on the display pair.
    pub slot_instant: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
    Rescheduled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "booked"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

/// Everything needed to book one slot for one visit: the slot fields as the
/// resolver returned them plus the patient and visit identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub speciality: String,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub patient_record_id: String,
    pub visit_id: Uuid,
    pub location_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_worker_id: Option<Uuid>,
    pub slot_day: String,
    pub slot_date: String,
    pub slot_time: String,
    pub slot_duration: i64,
    pub slot_duration_unit: DurationUnit,
    pub booked_by: Uuid,
}

// ==============================================================================
// CANCELLATION MODELS
// ==============================================================================

/// Policy knobs for a cancellation. Defaults describe a user-initiated
/// cancel; the reschedule path flips all three.
#[derive(Debug, Clone, Copy)]
pub struct CancelOptions {
    /// Refuse appointments whose slot is already in the past.
    pub validate_past: bool,
    /// Dispatch cancellation notices after the transition.
    pub notify: bool,
    /// Record the transition as `rescheduled` instead of `cancelled`.
    pub as_reschedule: bool,
}

impl Default for CancelOptions {
    fn default() -> Self {
        Self {
            validate_past: true,
            notify: true,
            as_reschedule: false,
        }
    }
}

/// Result of a cancellation attempt. Refusals are reported rather than
/// raised: a missing or already-past appointment is "nothing to do", not a
/// fault, and must not abort a caller working through a batch.
#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub status: bool,
    pub message: String,
}

// ==============================================================================
// RECONCILIATION MODELS
// ==============================================================================

/// A booked appointment the changed template no longer covers, paired with
/// the replacement booking that would move it onto a surviving slot.
#[derive(Debug, Clone, Serialize)]
pub struct RescheduleCandidate {
    pub appointment: Appointment,
    pub replacement: BookAppointmentRequest,
}

/// How a practitioner's future bookings fare against a candidate template.
/// Appointments the template still covers appear in neither bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileOutcome {
    pub reschedule: Vec<RescheduleCandidate>,
    pub cancel: Vec<Appointment>,
}

impl ReconcileOutcome {
    /// One stranded booking poisons the whole batch: nothing is moved
    /// automatically and every affected appointment goes back to the caller.
    pub fn requires_manual_handling(&self) -> bool {
        !self.cancel.is_empty()
    }

    pub fn affected_appointments(&self) -> Vec<Appointment> {
        self.cancel
            .iter()
            .cloned()
            .chain(self.reschedule.iter().map(|c| c.appointment.clone()))
            .collect()
    }
}

/// Envelope returned by `upsert_schedule`. `status` reports whether the
/// template was saved; a rejected save carries the bookings that need manual
/// rescheduling instead of the stored template.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertScheduleResponse {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DoctorSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_list: Option<Vec<Appointment>>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Slot is already booked")]
    SlotUnavailable,

    #[error("Visit already has a booked appointment")]
    VisitAlreadyBooked,

    #[error("Appointment not found")]
    NotFound,

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
