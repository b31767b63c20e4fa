// libs/appointment-cell/src/services/booking.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::models::CancellationNotice;
use notification_cell::services::CancellationNotifier;
use schedule_cell::services::calendar;
use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, CancelOptions,
    CancelOutcome,
};

/// Books visits onto slots and drives the cancellation/reschedule status
/// transitions. Slots have no rows of their own; a slot is taken exactly
/// while a `booked` appointment references its (doctor, date, time) value.
pub struct BookingService {
    store: Arc<StoreClient>,
    notifier: CancellationNotifier,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(config, Arc::new(StoreClient::new(config)))
    }

    pub fn with_store(config: &AppConfig, store: Arc<StoreClient>) -> Self {
        Self {
            notifier: CancellationNotifier::with_store(config, Arc::clone(&store)),
            store,
        }
    }

    /// Book a slot for a visit. The slot must not already hold a booked
    /// appointment, and the visit must not already have one.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for visit {} with doctor {} at {} {}",
            request.visit_id, request.doctor_id, request.slot_date, request.slot_time
        );

        if self.slot_already_booked(&request).await? {
            warn!(
                "Slot {} {} for doctor {} is already booked",
                request.slot_date, request.slot_time, request.doctor_id
            );
            return Err(AppointmentError::SlotUnavailable);
        }

        if self.get_appointment_for_visit(request.visit_id).await?.is_some() {
            warn!("Visit {} already has a booked appointment", request.visit_id);
            return Err(AppointmentError::VisitAlreadyBooked);
        }

        let slot_instant = calendar::slot_instant(&request.slot_date, &request.slot_time)?;
        let now = Utc::now();

        let appointment_data = json!({
            "doctor_id": request.doctor_id,
            "doctor_name": request.doctor_name,
            "speciality": request.speciality,
            "patient_id": request.patient_id,
            "patient_name": request.patient_name,
            "patient_record_id": request.patient_record_id,
            "visit_id": request.visit_id,
            "location_id": request.location_id,
            "health_worker_id": request.health_worker_id,
            "slot_day": request.slot_day,
            "slot_date": request.slot_date,
            "slot_time": request.slot_time,
            "slot_duration": request.slot_duration,
            "slot_duration_unit": request.slot_duration_unit,
            "slot_instant": slot_instant.to_rfc3339(),
            "status": AppointmentStatus::Booked.to_string(),
            "created_by": request.booked_by,
            "updated_by": request.booked_by,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(appointment_data),
            headers,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError("Failed to create appointment".to_string()));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse created appointment: {}", e)))?;

        info!("Appointment {} booked for visit {}", appointment.id, appointment.visit_id);
        Ok(appointment)
    }

    /// Cancel (or, for the reschedule path, release) an appointment. The load
    /// can additionally be scoped to a visit; an appointment outside that
    /// scope reads as not found.
    ///
    /// A missing appointment and, under `validate_past`, an already-past one
    /// come back as a refused `CancelOutcome` with nothing written. Notice
    /// delivery is best effort and never fails the cancellation.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        visit_id: Option<Uuid>,
        cancelled_by: Uuid,
        reason: Option<String>,
        options: CancelOptions,
    ) -> Result<CancelOutcome, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let mut path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        if let Some(visit_id) = visit_id {
            path.push_str(&format!("&visit_id=eq.{}", visit_id));
        }

        let Some(appointment) = self.fetch_appointment(&path).await? else {
            return Ok(CancelOutcome {
                status: false,
                message: "Appointment not found".to_string(),
            });
        };

        if options.validate_past && appointment.slot_instant <= Utc::now() {
            return Ok(CancelOutcome {
                status: false,
                message: "Cannot cancel past appointment".to_string(),
            });
        }

        let status = if options.as_reschedule {
            AppointmentStatus::Rescheduled
        } else {
            AppointmentStatus::Cancelled
        };

        let updated = self.transition(&appointment, status, cancelled_by, reason.as_deref()).await?;

        if options.notify {
            let notice = CancellationNotice {
                appointment_id: updated.id,
                patient_name: updated.patient_name.clone(),
                patient_record_id: updated.patient_record_id.clone(),
                slot_time: updated.slot_time.clone(),
            };
            self.notifier.notify_cancellation(&notice).await;
        }

        info!("Appointment {} marked {}", appointment_id, status);
        Ok(CancelOutcome {
            status: true,
            message: format!("Appointment {}", status),
        })
    }

    /// Move an appointment onto a new slot: the old row is released with
    /// status `rescheduled` (no notice, no past-validation), then the
    /// replacement is booked through the checked path under the same visit.
    /// A failed release propagates instead of booking.
    pub async fn reschedule_in_place(
        &self,
        appointment_id: Uuid,
        replacement: BookAppointmentRequest,
        rescheduled_by: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Rescheduling appointment {} onto {} {}",
            appointment_id, replacement.slot_date, replacement.slot_time
        );

        let released = self.cancel_appointment(
            appointment_id,
            None,
            rescheduled_by,
            reason,
            CancelOptions {
                validate_past: false,
                notify: false,
                as_reschedule: true,
            },
        ).await?;

        if !released.status {
            return Err(AppointmentError::NotFound);
        }

        self.book_appointment(replacement).await
    }

    /// The booked appointment for a visit, if one exists. Cancelled and
    /// rescheduled rows do not count as holding the visit.
    pub async fn get_appointment_for_visit(
        &self,
        visit_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?visit_id=eq.{}&status=eq.{}&limit=1",
            visit_id,
            AppointmentStatus::Booked,
        );

        self.fetch_appointment(&path).await
    }

    /// Booked appointments for a practitioner whose slot falls inside a
    /// display-date range, earliest first.
    pub async fn get_doctor_appointments(
        &self,
        doctor_id: Uuid,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching appointments for doctor {} between {} and {}", doctor_id, from_date, to_date);

        let (start, end) = calendar::to_instant_range(from_date, to_date)?;
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=eq.{}&slot_instant=gte.{}&slot_instant=lte.{}&order=slot_instant.asc",
            doctor_id,
            AppointmentStatus::Booked,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );

        self.fetch_appointments(&path).await
    }

    /// Booked appointments at a clinic location inside a display-date range,
    /// earliest first.
    pub async fn get_location_appointments(
        &self,
        location_id: Uuid,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching appointments for location {} between {} and {}", location_id, from_date, to_date);

        let (start, end) = calendar::to_instant_range(from_date, to_date)?;
        let path = format!(
            "/rest/v1/appointments?location_id=eq.{}&status=eq.{}&slot_instant=gte.{}&slot_instant=lte.{}&order=slot_instant.asc",
            location_id,
            AppointmentStatus::Booked,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );

        self.fetch_appointments(&path).await
    }

    /// Future booked appointments for a practitioner, newest slot first.
    /// Reconciliation reads the horizon off the first row.
    pub async fn get_future_appointments(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=eq.{}&slot_instant=gt.{}&order=slot_instant.desc",
            doctor_id,
            AppointmentStatus::Booked,
            urlencoding::encode(&Utc::now().to_rfc3339()),
        );

        self.fetch_appointments(&path).await
    }

    // Private helper methods

    async fn slot_already_booked(&self, request: &BookAppointmentRequest) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&slot_date=eq.{}&slot_time=eq.{}&status=eq.{}",
            request.doctor_id,
            urlencoding::encode(&request.slot_date),
            urlencoding::encode(&request.slot_time),
            AppointmentStatus::Booked,
        );

        let result: Vec<Value> = self.store.request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn transition(
        &self,
        appointment: &Appointment,
        status: AppointmentStatus,
        updated_by: Uuid,
        reason: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let update_data = json!({
            "status": status.to_string(),
            "updated_by": updated_by,
            "reason": reason,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::PATCH,
            &path,
            Some(update_data),
            headers,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse updated appointment: {}", e)))
    }

    async fn fetch_appointment(&self, path: &str) -> Result<Option<Appointment>, AppointmentError> {
        let result: Vec<Value> = self.store.request(Method::GET, path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn fetch_appointments(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self.store.request(Method::GET, path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}
