use chrono::{Datelike, NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use doctor_cell::models::{DayOfWeek, DoctorProfile};

use crate::models::{Appointment, AppointmentError};
use crate::services::availability::minutes_of;

/// Half-open interval overlap: [a,b) and [c,d) share time iff
/// NOT (d <= a OR c >= b). Exact adjacency does not overlap.
pub fn intervals_overlap(a: i32, b: i32, c: i32, d: i32) -> bool {
    !(d <= a || c >= b)
}

pub struct SlotConflictChecker {
    supabase: SupabaseClient,
}

impl SlotConflictChecker {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Whether a requested interval is inside the doctor's working hours for
    /// that weekday and clear of existing bookings. Callers re-run this right
    /// before the insert; the store's unique index has the final word.
    pub async fn is_slot_bookable(
        &self,
        doctor: &DoctorProfile,
        date: NaiveDate,
        requested_start: NaiveTime,
        requested_end: NaiveTime,
        auth_token: Option<&str>,
    ) -> Result<bool, AppointmentError> {
        let day = DayOfWeek::from_weekday(date.weekday());

        let Some(entry) = doctor.schedule_for(day) else {
            debug!("Doctor {} is not available on {}", doctor.id, day);
            return Ok(false);
        };

        let schedule_start = minutes_of(entry.start_time);
        let schedule_end = minutes_of(entry.end_time);
        let start = minutes_of(requested_start);
        let end = minutes_of(requested_end);

        if start < schedule_start || end > schedule_end {
            debug!(
                "Requested {}-{} falls outside working hours {}-{}",
                start, end, schedule_start, schedule_end
            );
            return Ok(false);
        }

        let existing = self
            .appointments_on_day(doctor.user_id, date, auth_token)
            .await?;

        let conflicting = existing.iter().any(|apt| {
            apt.status.blocks_slot()
                && intervals_overlap(start, end, minutes_of(apt.start_time), minutes_of(apt.end_time))
        });

        if conflicting {
            warn!(
                "Slot conflict for doctor {} on {} at {}-{}",
                doctor.id, date, requested_start, requested_end
            );
        }

        Ok(!conflicting)
    }

    async fn appointments_on_day(
        &self,
        doctor_user_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "appointments?doctor_id=eq.{}&date=eq.{}&status=not.in.(cancelled,no-show)&order=start_time.asc",
            doctor_user_id, date
        );

        let appointments = self.supabase.select(&path, auth_token).await?;
        Ok(appointments)
    }
}
