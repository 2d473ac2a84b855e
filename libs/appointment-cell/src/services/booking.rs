use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};
use shared_models::auth::User;

use doctor_cell::services::DoctorService;
use doctor_cell::models::DoctorError;

use crate::models::{
    Appointment, AppointmentDetail, AppointmentError, AppointmentStatus, AvailabilityDay,
    AvailabilityQuery, BookAppointmentRequest, CancelAppointmentRequest, PaymentInfo,
};
use crate::services::availability::AvailabilityService;
use crate::services::conditions::{derive_reason, HealthConditionService};
use crate::services::conflict::SlotConflictChecker;
use crate::services::lifecycle::AppointmentLifecycleService;

const DEFAULT_LOOKAHEAD_DAYS: u64 = 7;

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    availability: AvailabilityService,
    conflicts: SlotConflictChecker,
    conditions: HealthConditionService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            availability: AvailabilityService::new(config),
            conflicts: SlotConflictChecker::new(config),
            conditions: HealthConditionService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Open slots for one requested day, or the next seven days by default.
    pub async fn doctor_availability(
        &self,
        doctor_id: Uuid,
        query: AvailabilityQuery,
    ) -> Result<Vec<AvailabilityDay>, AppointmentError> {
        let doctor = self
            .doctors
            .get_doctor(doctor_id, None)
            .await
            .map_err(map_doctor_error)?;

        let (start_date, end_date) = match query.date {
            Some(date) => (date, next_day(date)?),
            None => {
                let today = Utc::now().date_naive();
                let end = today
                    .checked_add_days(chrono::Days::new(DEFAULT_LOOKAHEAD_DAYS))
                    .ok_or_else(|| {
                        AppointmentError::Validation("Date range exceeds the calendar".to_string())
                    })?;
                (today, end)
            }
        };

        self.availability
            .availability_for_range(&doctor, start_date, end_date, None)
            .await
    }

    /// Book a slot for the authenticated patient. The conflict check runs
    /// immediately before the insert; the unique index on
    /// (doctor_id, date, start_time) settles simultaneous winners.
    pub async fn book_appointment(
        &self,
        patient: &User,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let (doctor_id, date, start_time, end_time) = validate_booking_fields(&request)?;

        let patient_id = Uuid::parse_str(&patient.id)
            .map_err(|_| AppointmentError::Validation("Invalid patient id".to_string()))?;

        let doctor = self
            .doctors
            .get_doctor(doctor_id, Some(auth_token))
            .await
            .map_err(map_doctor_error)?;

        let bookable = self
            .conflicts
            .is_slot_bookable(&doctor, date, start_time, end_time, Some(auth_token))
            .await?;
        if !bookable {
            return Err(AppointmentError::SlotUnavailable);
        }

        let matched = self
            .conditions
            .conditions_by_ids(&request.condition_ids)
            .await?;
        let reason = derive_reason(&matched);

        let notes: Vec<String> = request.notes.into_iter().collect();

        let row = json!({
            "patient_id": patient_id,
            "doctor_id": doctor.user_id,
            "date": date,
            "start_time": start_time.format("%H:%M").to_string(),
            "end_time": end_time.format("%H:%M").to_string(),
            "status": AppointmentStatus::Scheduled,
            "reason": reason,
            "notes": notes,
            "payment": PaymentInfo::pending(doctor.consultation_fee),
            "created_at": Utc::now().to_rfc3339(),
        });

        let appointment: Appointment = self
            .supabase
            .insert_returning("appointments", row, Some(auth_token))
            .await
            .map_err(|e| match e {
                // Unique (doctor_id, date, start_time) violation: another
                // booking won the race between check and insert.
                StoreError::Conflict(_) => AppointmentError::SlotUnavailable,
                other => AppointmentError::Database(other.to_string()),
            })?;

        info!(
            "Appointment {} booked for patient {} with doctor {} on {} {}",
            appointment.id, patient_id, doctor.id, date, start_time
        );

        Ok(appointment)
    }

    /// Detail read with embedded participant summaries. Participants and
    /// admins only.
    pub async fn get_appointment_detail(
        &self,
        appointment_id: Uuid,
        caller: &User,
        auth_token: &str,
    ) -> Result<AppointmentDetail, AppointmentError> {
        let path = format!(
            "appointments?id=eq.{}&select=*,patient:profiles!patient_id(id,full_name,email),doctor:profiles!doctor_id(id,full_name,email)",
            appointment_id
        );

        let rows: Vec<AppointmentDetail> = self.supabase.select(&path, Some(auth_token)).await?;
        let detail = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;

        if !detail.appointment.is_participant(&caller.id) && !caller.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }

        Ok(detail)
    }

    /// The caller's appointments: doctor-side or patient-side by role.
    pub async fn appointments_for_user(
        &self,
        caller: &User,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let column = if caller.role.as_deref() == Some("doctor") {
            "doctor_id"
        } else {
            "patient_id"
        };

        let path = format!(
            "appointments?{}=eq.{}&order=date.asc,start_time.asc",
            column, caller.id
        );

        let appointments = self.supabase.select(&path, Some(auth_token)).await?;
        Ok(appointments)
    }

    /// Cancel an appointment: participant or admin, non-terminal status only.
    /// A supplied reason is preserved as a note.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        caller: &User,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.is_participant(&caller.id) && !caller.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle.validate_cancellation(appointment.status)?;

        let mut notes = appointment.notes.clone();
        if let Some(reason) = request.reason.filter(|r| !r.is_empty()) {
            notes.push(format!("Cancelled: {}", reason));
        }

        let updated: Appointment = self
            .supabase
            .update_returning(
                &format!("appointments?id=eq.{}", appointment_id),
                json!({
                    "status": AppointmentStatus::Cancelled,
                    "notes": notes,
                }),
                Some(auth_token),
            )
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AppointmentError::NotFound,
                other => AppointmentError::Database(other.to_string()),
            })?;

        info!(
            "Appointment {} cancelled by {} ({})",
            appointment_id,
            caller.id,
            caller.role.as_deref().unwrap_or("patient")
        );

        Ok(updated)
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("appointments?id=eq.{}&limit=1", appointment_id);
        let rows: Vec<Appointment> = self.supabase.select(&path, Some(auth_token)).await?;
        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }
}

fn validate_booking_fields(
    request: &BookAppointmentRequest,
) -> Result<(Uuid, NaiveDate, NaiveTime, NaiveTime), AppointmentError> {
    debug!("Validating booking request");

    let doctor_id = request.doctor_id.ok_or_else(|| {
        AppointmentError::Validation("Doctor ID, date, start time and end time are required".to_string())
    })?;
    let (Some(date), Some(start_time), Some(end_time)) =
        (request.date, request.start_time, request.end_time)
    else {
        return Err(AppointmentError::Validation(
            "Doctor ID, date, start time and end time are required".to_string(),
        ));
    };

    if start_time >= end_time {
        return Err(AppointmentError::Validation(
            "Start time must be before end time".to_string(),
        ));
    }

    Ok((doctor_id, date, start_time, end_time))
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, AppointmentError> {
    date.succ_opt()
        .ok_or_else(|| AppointmentError::Validation("Date out of range".to_string()))
}

fn map_doctor_error(e: DoctorError) -> AppointmentError {
    match e {
        DoctorError::NotFound => AppointmentError::DoctorNotFound,
        DoctorError::Validation(msg) => AppointmentError::Validation(msg),
        DoctorError::Database(msg) => AppointmentError::Database(msg),
    }
}
