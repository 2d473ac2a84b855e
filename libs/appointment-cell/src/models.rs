use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::{hhmm, DayOfWeek};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that still occupy their slot for conflict purposes.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasonType {
    Physical,
    Mental,
}

/// Why the patient booked, derived from their selected health condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentReason {
    pub name: String,
    pub reason_type: ReasonType,
}

impl Default for AppointmentReason {
    fn default() -> Self {
        Self {
            name: String::new(),
            reason_type: ReasonType::Physical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub amount: f64,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentInfo {
    /// Payment sub-record as initialized by the booking flow: the doctor's
    /// fee, not yet collected.
    pub fn pending(amount: f64) -> Self {
        Self {
            amount,
            status: PaymentStatus::Pending,
            transaction_id: None,
            method: None,
            paid_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// The doctor's auth user id, not the profile id.
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: AppointmentReason,
    #[serde(default)]
    pub notes: Vec<String>,
    pub payment: PaymentInfo,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.patient_id.to_string() == user_id || self.doctor_id.to_string() == user_id
    }
}

/// Compact profile of a participant, embedded on detail reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartySummary {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(default)]
    pub patient: Option<PartySummary>,
    #[serde(default)]
    pub doctor: Option<PartySummary>,
}

// ==============================================================================
// AVAILABILITY MODELS (ephemeral, computed on demand)
// ==============================================================================

/// A candidate appointment window. Start/end stay formatted strings because
/// the trailing partial window's nominal end can pass the schedule boundary
/// (even midnight) and is still offered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: String,
    pub end: String,
    pub formatted_start: String,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    pub day: DayOfWeek,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Booking request body. Core fields are optional so absence surfaces as a
/// 400 validation failure rather than a deserialization rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm_opt")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm_opt")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub condition_ids: Vec<String>,
    pub notes: Option<String>,
}

mod hhmm_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            NaiveTime::parse_from_str(&s, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConditionQuery {
    pub category: Option<String>,
}

// ==============================================================================
// HEALTH CONDITION CATALOG
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCondition {
    pub id: String,
    pub name: String,
    pub category: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("This time slot is not available")]
    SlotUnavailable,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot cancel an appointment with status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Not authorized to access this appointment")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<shared_database::StoreError> for AppointmentError {
    fn from(err: shared_database::StoreError) -> Self {
        AppointmentError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(AppointmentStatus::InProgress).unwrap(),
            "in-progress"
        );
        assert_eq!(
            serde_json::to_value(AppointmentStatus::NoShow).unwrap(),
            "no-show"
        );
        let parsed: AppointmentStatus = serde_json::from_value("no-show".into()).unwrap();
        assert_eq!(parsed, AppointmentStatus::NoShow);
    }

    #[test]
    fn cancelled_and_no_show_do_not_block_slots() {
        assert!(AppointmentStatus::Scheduled.blocks_slot());
        assert!(AppointmentStatus::Confirmed.blocks_slot());
        assert!(!AppointmentStatus::Cancelled.blocks_slot());
        assert!(!AppointmentStatus::NoShow.blocks_slot());
    }

    #[test]
    fn default_reason_is_blank_physical() {
        let reason = AppointmentReason::default();
        assert_eq!(reason.name, "");
        assert_eq!(reason.reason_type, ReasonType::Physical);
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["reason_type"], "physical");
    }

    #[test]
    fn booking_request_tolerates_missing_fields() {
        let request: BookAppointmentRequest = serde_json::from_value(serde_json::json!({
            "doctor_id": Uuid::new_v4(),
        }))
        .unwrap();
        assert!(request.date.is_none());
        assert!(request.start_time.is_none());
        assert!(request.condition_ids.is_empty());
    }
}
