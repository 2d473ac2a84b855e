use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{DoctorError, DoctorProfile, WeeklyScheduleEntry};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Look up a doctor profile by its profile id.
    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<DoctorProfile, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let rows: Vec<DoctorProfile> = self
            .supabase
            .select(&format!("doctors?id=eq.{}&limit=1", doctor_id), auth_token)
            .await
            .map_err(store_error)?;

        rows.into_iter().next().ok_or(DoctorError::NotFound)
    }

    /// Replace a doctor's weekly availability schedule.
    pub async fn update_schedule(
        &self,
        doctor_id: Uuid,
        schedule: Vec<WeeklyScheduleEntry>,
        auth_token: &str,
    ) -> Result<DoctorProfile, DoctorError> {
        debug!(
            "Updating schedule for doctor {} ({} entries)",
            doctor_id,
            schedule.len()
        );

        for entry in &schedule {
            if entry.start_time >= entry.end_time {
                return Err(DoctorError::Validation(format!(
                    "Schedule entry for {} must start before it ends",
                    entry.day
                )));
            }
        }

        let updated: DoctorProfile = self
            .supabase
            .update_returning(
                &format!("doctors?id=eq.{}", doctor_id),
                json!({ "availability_schedule": schedule }),
                Some(auth_token),
            )
            .await
            .map_err(store_error)?;

        Ok(updated)
    }
}

fn store_error(err: StoreError) -> DoctorError {
    match err {
        StoreError::NotFound(_) => DoctorError::NotFound,
        other => DoctorError::Database(other.to_string()),
    }
}
