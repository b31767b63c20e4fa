// libs/appointment-cell/src/services/reconcile.rs
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::models::{FreeSlotQuery, Slot, SlotScope, UpsertScheduleRequest};
use schedule_cell::services::calendar;
use schedule_cell::services::{ScheduleService, SlotService};
use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{
    Appointment, AppointmentError, BookAppointmentRequest, ReconcileOutcome, RescheduleCandidate,
    UpsertScheduleResponse,
};
use crate::services::booking::BookingService;

/// Acting identity recorded on reschedules the reconciler applies itself.
pub const SYSTEM_SCHEDULER: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);

const SCHEDULE_CHANGE_REASON: &str = "Doctor's schedule has changed";

/// Owns the template upsert flow: saving a changed availability template is
/// only allowed once every future booking under it has been revalidated, and
/// clean moves are applied before the template lands.
pub struct ScheduleReconciler {
    schedules: ScheduleService,
    slots: SlotService,
    bookings: BookingService,
}

impl ScheduleReconciler {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(config, Arc::new(StoreClient::new(config)))
    }

    pub fn with_store(config: &AppConfig, store: Arc<StoreClient>) -> Self {
        Self {
            schedules: ScheduleService::with_store(Arc::clone(&store)),
            slots: SlotService::with_store(Arc::clone(&store)),
            bookings: BookingService::with_store(config, store),
        }
    }

    /// Save a practitioner's availability template, revalidating existing
    /// bookings first.
    ///
    /// A change that would strand even one booked appointment saves nothing:
    /// the whole affected batch comes back in `reschedule_list` for manual
    /// handling. A batch where every displaced booking has a replacement is
    /// moved automatically, after which the template is written and
    /// overlapping windows of the practitioner's other specialities are
    /// trimmed back.
    pub async fn upsert_schedule(
        &self,
        request: UpsertScheduleRequest,
    ) -> Result<UpsertScheduleResponse, AppointmentError> {
        info!(
            "Upserting {} schedule for doctor {} ({}/{})",
            request.speciality, request.doctor_id, request.month, request.year
        );

        let existing = self
            .schedules
            .find_schedule(request.doctor_id, request.year, request.month, &request.speciality)
            .await?;

        let outcome = self.reconcile_bookings(&request).await?;

        if outcome.requires_manual_handling() {
            let affected = outcome.affected_appointments();
            warn!(
                "Schedule change for doctor {} strands {} booked appointment(s), rejecting upsert",
                request.doctor_id,
                affected.len()
            );

            return Ok(UpsertScheduleResponse {
                status: false,
                message: format!(
                    "Schedule not saved: {} booked appointment(s) have no replacement slot and need manual rescheduling",
                    affected.len()
                ),
                data: None,
                reschedule_list: Some(affected),
            });
        }

        for candidate in &outcome.reschedule {
            self.bookings
                .reschedule_in_place(
                    candidate.appointment.id,
                    candidate.replacement.clone(),
                    SYSTEM_SCHEDULER,
                    Some(SCHEDULE_CHANGE_REASON.to_string()),
                )
                .await?;
        }

        let (schedule, message) = match existing {
            Some(existing) => (
                self.schedules.update_schedule(existing.id, &request).await?,
                "Schedule updated successfully",
            ),
            None => (
                self.schedules.create_schedule(&request).await?,
                "Schedule created successfully",
            ),
        };

        self.schedules.trim_overlapping_specialities(&request).await?;

        Ok(UpsertScheduleResponse {
            status: true,
            message: message.to_string(),
            data: Some(schedule),
            reschedule_list: None,
        })
    }

    /// Partition the practitioner's future bookings against a candidate
    /// template: bookings the template still covers are dropped, the rest
    /// become reschedule candidates or cancellations. Nothing is written
    /// here; the batch policy in `upsert_schedule` decides what to apply.
    pub async fn reconcile_bookings(
        &self,
        request: &UpsertScheduleRequest,
    ) -> Result<ReconcileOutcome, AppointmentError> {
        let appointments = self.bookings.get_future_appointments(request.doctor_id).await?;
        if appointments.is_empty() {
            debug!("No future bookings for doctor {}, nothing to reconcile", request.doctor_id);
            return Ok(ReconcileOutcome::default());
        }

        // Rows arrive newest first, so the horizon is the first row's date.
        let horizon = appointments[0].slot_date.clone();
        let today = calendar::format_display_date(Utc::now().date_naive());

        let candidate = request.as_candidate();
        let raw = self.slots.all_slots_for_schedule(&candidate, &today, &horizon).await?;

        let mut outcome = ReconcileOutcome::default();

        for appointment in appointments {
            if raw.iter().any(|slot| slot_covers(slot, &appointment)) {
                continue;
            }

            match self.find_replacement_slot(&appointment, &horizon).await? {
                Some(slot) => {
                    debug!(
                        "Appointment {} can move to {} {} with doctor {}",
                        appointment.id, slot.slot_date, slot.slot_time, slot.doctor_id
                    );
                    let replacement = replacement_request(&appointment, &slot);
                    outcome.reschedule.push(RescheduleCandidate { appointment, replacement });
                }
                None => {
                    debug!("No replacement slot for appointment {}", appointment.id);
                    outcome.cancel.push(appointment);
                }
            }
        }

        info!(
            "Reconciled bookings for doctor {}: {} with a replacement, {} without",
            request.doctor_id,
            outcome.reschedule.len(),
            outcome.cancel.len()
        );
        Ok(outcome)
    }

    /// The earliest free slot offering the appointment's time-of-day between
    /// the appointment's own day and the horizon, searched within the
    /// appointment's speciality. The slot may belong to another practitioner.
    async fn find_replacement_slot(
        &self,
        appointment: &Appointment,
        horizon: &str,
    ) -> Result<Option<Slot>, AppointmentError> {
        let free = self
            .slots
            .find_free_slots(FreeSlotQuery {
                scope: SlotScope::Speciality(appointment.speciality.clone()),
                from_date: appointment.slot_date.clone(),
                to_date: horizon.to_string(),
            })
            .await?;

        let mut best: Option<(NaiveDate, Slot)> = None;
        for slot in free.slots {
            if slot.slot_time != appointment.slot_time {
                continue;
            }

            let date = calendar::parse_display_date(&slot.slot_date)?;
            match &best {
                Some((held, _)) if *held <= date => {}
                _ => best = Some((date, slot)),
            }
        }

        Ok(best.map(|(_, slot)| slot))
    }
}

fn slot_covers(slot: &Slot, appointment: &Appointment) -> bool {
    slot.slot_time == appointment.slot_time
        && slot.slot_date == appointment.slot_date
        && slot.slot_day == appointment.slot_day
        && slot.doctor_id == appointment.doctor_id
}

/// Replacement booking for a displaced appointment: the slot decides the
/// practitioner and timing, the appointment keeps its patient, visit and
/// location identity.
fn replacement_request(appointment: &Appointment, slot: &Slot) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: slot.doctor_id,
        doctor_name: slot.doctor_name.clone(),
        speciality: slot.speciality.clone(),
        patient_id: appointment.patient_id,
        patient_name: appointment.patient_name.clone(),
        patient_record_id: appointment.patient_record_id.clone(),
        visit_id: appointment.visit_id,
        location_id: appointment.location_id,
        health_worker_id: appointment.health_worker_id,
        slot_day: slot.slot_day.clone(),
        slot_date: slot.slot_date.clone(),
        slot_time: slot.slot_time.clone(),
        slot_duration: slot.slot_duration,
        slot_duration_unit: slot.slot_duration_unit,
        booked_by: SYSTEM_SCHEDULER,
    }
}
