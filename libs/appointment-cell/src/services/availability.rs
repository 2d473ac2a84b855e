use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use doctor_cell::models::{DayOfWeek, DoctorProfile, WeeklyScheduleEntry};

use crate::models::{Appointment, AppointmentError, AvailabilityDay, Slot};
use crate::services::conflict::intervals_overlap;

pub fn minutes_of(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

/// "HH:MM" from minutes since midnight. Not clamped to 24h: the trailing
/// partial window of a schedule may nominally end past midnight.
pub fn format_hhmm(minutes: i32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// 12-hour display label, e.g. 540 -> "9:00 AM". Hours 0 and 12 render as 12.
pub fn format_12h(minutes: i32) -> String {
    let hours = minutes / 60;
    let period = if hours >= 12 { "PM" } else { "AM" };
    let hour12 = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", hour12, minutes % 60, period)
}

/// Partition a working window into fixed-duration slots, dropping any that
/// overlap a booked interval. The step is always `slot_minutes`, so the last
/// slot may extend past `schedule_end`.
pub fn slots_for_window(
    schedule_start: NaiveTime,
    schedule_end: NaiveTime,
    booked: &[(i32, i32)],
    slot_minutes: i32,
) -> Vec<Slot> {
    let start = minutes_of(schedule_start);
    let end = minutes_of(schedule_end);

    let mut slots = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let slot_end = cursor + slot_minutes;

        let is_booked = booked
            .iter()
            .any(|&(apt_start, apt_end)| intervals_overlap(cursor, slot_end, apt_start, apt_end));

        if !is_booked {
            slots.push(Slot {
                start: format_hhmm(cursor),
                end: format_hhmm(slot_end),
                formatted_start: format_12h(cursor),
                duration_minutes: slot_minutes,
            });
        }

        cursor += slot_minutes;
    }

    slots
}

pub struct AvailabilityService {
    supabase: SupabaseClient,
    slot_minutes: i32,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            slot_minutes: config.slot_duration_minutes,
        }
    }

    /// Day-by-day open slots for [start_date, end_date). Read-only: days the
    /// doctor does not work contribute an empty slot list.
    pub async fn availability_for_range(
        &self,
        doctor: &DoctorProfile,
        start_date: NaiveDate,
        end_date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityDay>, AppointmentError> {
        debug!(
            "Generating availability for doctor {} from {} to {}",
            doctor.id, start_date, end_date
        );

        let existing = self
            .appointments_in_range(doctor.user_id, start_date, end_date, auth_token)
            .await?;

        let mut days = Vec::new();
        let mut current = start_date;
        while current < end_date {
            let day = DayOfWeek::from_weekday(current.weekday());

            let slots = match doctor.schedule_for(day) {
                Some(entry) => self.day_slots(entry, current, &existing),
                None => Vec::new(),
            };

            days.push(AvailabilityDay {
                date: current,
                day,
                slots,
            });

            current = current.succ_opt().ok_or_else(|| {
                AppointmentError::Validation("Date range exceeds the calendar".to_string())
            })?;
        }

        Ok(days)
    }

    fn day_slots(
        &self,
        entry: &WeeklyScheduleEntry,
        date: NaiveDate,
        existing: &[Appointment],
    ) -> Vec<Slot> {
        let booked: Vec<(i32, i32)> = existing
            .iter()
            .filter(|apt| apt.date == date && apt.status.blocks_slot())
            .map(|apt| (minutes_of(apt.start_time), minutes_of(apt.end_time)))
            .collect();

        slots_for_window(entry.start_time, entry.end_time, &booked, self.slot_minutes)
    }

    async fn appointments_in_range(
        &self,
        doctor_user_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "appointments?doctor_id=eq.{}&date=gte.{}&date=lt.{}&status=not.in.(cancelled,no-show)&order=date.asc,start_time.asc",
            doctor_user_id, start_date, end_date
        );

        let appointments = self.supabase.select(&path, auth_token).await?;
        Ok(appointments)
    }
}
