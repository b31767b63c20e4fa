// libs/schedule-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::store::StoreClient;

use crate::models::{
    BookedSlot, DoctorSchedule, FreeSlotQuery, FreeSlotsResponse, RecurrenceType,
    ScheduleDay, ScheduleError, SchedulingSettings, Slot, SlotScope,
};
use crate::services::calendar;

/// Expands availability templates into concrete slots and resolves the free
/// set against booked appointments.
pub struct SlotService {
    store: Arc<StoreClient>,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: Arc::new(StoreClient::new(config)),
        }
    }

    pub fn with_store(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    /// Free bookable slots for a speciality or practitioner over a
    /// display-date range.
    pub async fn find_free_slots(&self, query: FreeSlotQuery) -> Result<FreeSlotsResponse, ScheduleError> {
        debug!("Resolving free slots for {:?} between {} and {}",
               query.scope, query.from_date, query.to_date);

        let schedules = self.get_schedules_for_scope(&query.scope).await?;
        if schedules.is_empty() {
            return Ok(FreeSlotsResponse { count: 0, slots: Vec::new() });
        }

        let from = calendar::parse_display_date(&query.from_date)?;
        let to = calendar::parse_display_date(&query.to_date)?;
        let days: Vec<ScheduleDay> = calendar::day_sequence(from, to)?.collect();

        let settings = self.get_settings().await?;

        let mut generated = Vec::new();
        for schedule in &schedules {
            generated.extend(generate_slots(schedule, &days, &settings));
        }

        // Booked rows are loaded for the whole instant range without a
        // speciality filter; a booking under any speciality occupies the slot.
        let booked = self.get_booked_slots_in_range(&query.from_date, &query.to_date).await?;

        let mut free = dedup_upcoming(generated, Utc::now());
        subtract_booked(&mut free, &booked);

        debug!("Resolved {} free slots", free.len());
        Ok(FreeSlotsResponse { count: free.len(), slots: free })
    }

    /// Raw theoretical slot set for a single template over a display-date
    /// range: no dedup, no booked-slot subtraction, no today-pruning. Used by
    /// reconciliation to learn which bookings a schedule still covers.
    pub async fn all_slots_for_schedule(
        &self,
        schedule: &DoctorSchedule,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<Slot>, ScheduleError> {
        debug!("Expanding schedule {} for doctor {} between {} and {}",
               schedule.speciality, schedule.doctor_id, from_date, to_date);

        let from = calendar::parse_display_date(from_date)?;
        let to = calendar::parse_display_date(to_date)?;
        let days: Vec<ScheduleDay> = calendar::day_sequence(from, to)?.collect();

        let settings = self.get_settings().await?;

        Ok(generate_slots(schedule, &days, &settings))
    }

    // Private helper methods

    async fn get_schedules_for_scope(&self, scope: &SlotScope) -> Result<Vec<DoctorSchedule>, ScheduleError> {
        let path = match scope {
            SlotScope::Speciality(speciality) => format!(
                "/rest/v1/doctor_schedules?speciality=eq.{}",
                urlencoding::encode(speciality)
            ),
            SlotScope::Doctor(doctor_id) => format!(
                "/rest/v1/doctor_schedules?doctor_id=eq.{}",
                doctor_id
            ),
        };

        let result: Vec<Value> = self.store.request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<DoctorSchedule>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedules: {}", e)))
    }

    async fn get_settings(&self) -> Result<SchedulingSettings, ScheduleError> {
        let result: Vec<Value> = self.store.request(
            Method::GET,
            "/rest/v1/scheduling_settings?limit=1",
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse settings: {}", e))),
            None => Ok(SchedulingSettings::default()),
        }
    }

    async fn get_booked_slots_in_range(&self, from_date: &str, to_date: &str) -> Result<Vec<BookedSlot>, ScheduleError> {
        let (start, end) = calendar::to_instant_range(from_date, to_date)?;

        let path = format!(
            "/rest/v1/appointments?status=eq.booked&slot_instant=gte.{}&slot_instant=lte.{}",
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );

        let result: Vec<Value> = self.store.request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<BookedSlot>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse booked slots: {}", e)))
    }
}

/// Expand one template over an enumerated day sequence, dispatching on its
/// recurrence type.
pub fn generate_slots(
    schedule: &DoctorSchedule,
    days: &[ScheduleDay],
    settings: &SchedulingSettings,
) -> Vec<Slot> {
    match schedule.recurrence {
        RecurrenceType::Monthly => monthly_slots(schedule, days, settings),
        RecurrenceType::Weekly => weekly_slots(schedule, days, settings),
    }
}

/// Monthly rules fire on the exact date they carry, so a template never
/// emits slots outside its own month; every matching rule contributes its
/// window.
fn monthly_slots(
    schedule: &DoctorSchedule,
    days: &[ScheduleDay],
    settings: &SchedulingSettings,
) -> Vec<Slot> {
    let mut slots = Vec::new();

    for day in days {
        let matching = schedule.slot_schedule.iter()
            .filter(|rule| rule.date == Some(day.date));

        for rule in matching {
            if let Some((start, end)) = rule.working_window() {
                fill_window(schedule, day, start, end, settings, &mut slots);
            }
        }
    }

    slots
}

/// Weekly rules match by weekday name; the first matching rule wins.
fn weekly_slots(
    schedule: &DoctorSchedule,
    days: &[ScheduleDay],
    settings: &SchedulingSettings,
) -> Vec<Slot> {
    let mut slots = Vec::new();

    for day in days {
        let rule = schedule.slot_schedule.iter().find(|rule| rule.day == day.day);

        if let Some((start, end)) = rule.and_then(|r| r.working_window()) {
            fill_window(schedule, day, start, end, settings, &mut slots);
        }
    }

    slots
}

fn fill_window(
    schedule: &DoctorSchedule,
    day: &ScheduleDay,
    start: NaiveTime,
    end: NaiveTime,
    settings: &SchedulingSettings,
    out: &mut Vec<Slot>,
) {
    // Fixed business-hours floor: slots at or before 08:00 are never offered,
    // whatever the configured window start.
    let floor = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

    let step = settings.slot_duration_unit.as_duration(settings.slot_duration);
    if step <= Duration::zero() {
        return;
    }

    let mut current = start;
    while current < end {
        if current > floor {
            out.push(Slot {
                slot_day: day.day.clone(),
                slot_date: day.display_date.clone(),
                slot_time: calendar::format_display_time(current),
                slot_duration: settings.slot_duration,
                slot_duration_unit: settings.slot_duration_unit,
                speciality: schedule.speciality.clone(),
                doctor_id: schedule.doctor_id,
                doctor_name: schedule.doctor_name.clone(),
            });
        }

        // A step crossing midnight ends the window.
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }
}

/// Collapse generated slots to unique time-of-day values, dropping today's
/// already-passed times. First occurrence wins, as generation order dictates.
pub fn dedup_upcoming(generated: Vec<Slot>, now: DateTime<Utc>) -> Vec<Slot> {
    let today = calendar::format_display_date(now.date_naive());
    let mut unique: Vec<Slot> = Vec::new();

    for slot in generated {
        if unique.iter().any(|s| s.slot_time == slot.slot_time) {
            continue;
        }

        if slot.slot_date == today {
            match calendar::parse_display_time(&slot.slot_time) {
                Ok(time) if time > now.time() => unique.push(slot),
                _ => {}
            }
        } else {
            unique.push(slot);
        }
    }

    unique
}

/// Remove slots already taken by a booked appointment, matched on the exact
/// (time, date, weekday, practitioner) tuple.
pub fn subtract_booked(slots: &mut Vec<Slot>, booked: &[BookedSlot]) {
    slots.retain(|slot| {
        !booked.iter().any(|b| {
            b.slot_time == slot.slot_time
                && b.slot_date == slot.slot_date
                && b.slot_day == slot.slot_day
                && b.doctor_id == slot.doctor_id
        })
    });
}
