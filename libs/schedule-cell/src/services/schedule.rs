// libs/schedule-cell/src/services/schedule.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::store::StoreClient;

use crate::models::{DaySlotRule, DoctorSchedule, ScheduleError, UpsertScheduleRequest};

/// Persistence and maintenance of availability templates.
pub struct ScheduleService {
    store: Arc<StoreClient>,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: Arc::new(StoreClient::new(config)),
        }
    }

    pub fn with_store(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    /// The template stored for one (practitioner, year, month, speciality),
    /// if any. Templates are unique over that key.
    pub async fn find_schedule(
        &self,
        doctor_id: Uuid,
        year: i32,
        month: u32,
        speciality: &str,
    ) -> Result<Option<DoctorSchedule>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&year=eq.{}&month=eq.{}&speciality=eq.{}&limit=1",
            doctor_id, year, month,
            urlencoding::encode(speciality),
        );

        let result: Vec<Value> = self.store.request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result.into_iter().next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))
    }

    /// All templates belonging to a practitioner, optionally narrowed to one
    /// speciality.
    pub async fn get_schedules(
        &self,
        doctor_id: Uuid,
        speciality: Option<&str>,
    ) -> Result<Vec<DoctorSchedule>, ScheduleError> {
        debug!("Fetching schedules for doctor: {}", doctor_id);

        let mut path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        if let Some(speciality) = speciality {
            path.push_str(&format!("&speciality=eq.{}", urlencoding::encode(speciality)));
        }

        let result: Vec<Value> = self.store.request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<DoctorSchedule>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedules: {}", e)))
    }

    pub async fn create_schedule(&self, request: &UpsertScheduleRequest) -> Result<DoctorSchedule, ScheduleError> {
        debug!("Creating {} schedule for doctor {}", request.speciality, request.doctor_id);

        let schedule_data = json!({
            "doctor_id": request.doctor_id,
            "doctor_name": request.doctor_name,
            "speciality": request.speciality,
            "year": request.year,
            "month": request.month,
            "recurrence": request.recurrence,
            "slot_days": dedup_slot_days(&request.slot_days),
            "slot_schedule": request.slot_schedule,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_schedules",
            Some(schedule_data),
            headers,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::DatabaseError("Failed to create schedule".to_string()));
        }

        let schedule: DoctorSchedule = serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))?;

        info!("Schedule {} created for doctor {}", schedule.id, schedule.doctor_id);
        Ok(schedule)
    }

    pub async fn update_schedule(
        &self,
        schedule_id: Uuid,
        request: &UpsertScheduleRequest,
    ) -> Result<DoctorSchedule, ScheduleError> {
        debug!("Updating schedule {}", schedule_id);

        let update_data = json!({
            "doctor_name": request.doctor_name,
            "recurrence": request.recurrence,
            "slot_days": dedup_slot_days(&request.slot_days),
            "slot_schedule": request.slot_schedule,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", schedule_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.store.request_with_headers(
            Method::PATCH,
            &path,
            Some(update_data),
            headers,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))
    }

    /// After a template is saved for one speciality, pull every other
    /// speciality's template for the same practitioner and month back out of
    /// the newly claimed windows. A practitioner is never offered under two
    /// specialities at once.
    pub async fn trim_overlapping_specialities(&self, request: &UpsertScheduleRequest) -> Result<(), ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&year=eq.{}&month=eq.{}&speciality=neq.{}",
            request.doctor_id, request.year, request.month,
            urlencoding::encode(&request.speciality),
        );

        let result: Vec<Value> = self.store.request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let others: Vec<DoctorSchedule> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<DoctorSchedule>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedules: {}", e)))?;

        for other in others {
            let (merged, changed) = merge_day_rules(&other.slot_schedule, &request.slot_schedule);
            if !changed {
                continue;
            }

            info!("Trimming {} schedule {} around new {} windows",
                  other.speciality, other.id, request.speciality);

            let update_data = json!({
                "slot_schedule": merged,
                "updated_at": Utc::now().to_rfc3339()
            });

            let path = format!("/rest/v1/doctor_schedules?id=eq.{}", other.id);
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

            let _: Vec<Value> = self.store.request_with_headers(
                Method::PATCH,
                &path,
                Some(update_data),
                headers,
            ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;
        }

        Ok(())
    }
}

/// Deduplicate `||`-joined day tokens, preserving first-occurrence order.
pub fn dedup_slot_days(raw: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();

    for token in raw.split("||") {
        let token = token.trim();
        if token.is_empty() || seen.contains(&token) {
            continue;
        }
        seen.push(token);
    }

    seen.join("||")
}

/// Resolve window overlaps between an existing speciality's day rules and the
/// rules just saved for another speciality on the same practitioner/month.
///
/// Per overlapping day: an identical or fully covered window drops the old
/// rule; a disjoint window keeps it untouched; a new window overlapping the
/// old rule's tail pulls the old end back to the new start; any other overlap
/// pushes the old start to the new end. Returns the merged rules and whether
/// anything changed.
pub fn merge_day_rules(existing: &[DaySlotRule], incoming: &[DaySlotRule]) -> (Vec<DaySlotRule>, bool) {
    let mut merged = Vec::new();
    let mut changed = false;

    for rule in existing {
        let Some((old_start, old_end)) = rule.working_window() else {
            merged.push(rule.clone());
            continue;
        };
        let Some((new_start, new_end)) = incoming.iter()
            .find(|r| r.day == rule.day)
            .and_then(|r| r.working_window())
        else {
            merged.push(rule.clone());
            continue;
        };

        if new_start == old_start && new_end == old_end {
            changed = true;
            continue;
        }

        if new_end <= old_start || new_start >= old_end {
            merged.push(rule.clone());
            continue;
        }

        if new_start <= old_start && new_end >= old_end {
            changed = true;
            continue;
        }

        if new_start > old_start && new_end >= old_end {
            let mut trimmed = rule.clone();
            trimmed.end_time = Some(new_start);
            merged.push(trimmed);
            changed = true;
            continue;
        }

        let mut trimmed = rule.clone();
        trimmed.start_time = Some(new_end);
        merged.push(trimmed);
        changed = true;
    }

    (merged, changed)
}
