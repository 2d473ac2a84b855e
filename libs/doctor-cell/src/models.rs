use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Serde helper for times-of-day crossing the wire as "HH:MM"
/// (PostgREST's "HH:MM:SS" is accepted on the way in).
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        };
        write!(f, "{}", name)
    }
}

/// One weekday's declared working hours. A doctor holds at most one entry
/// per day in practice, though the model does not enforce uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub day: DayOfWeek,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    /// Auth user behind this profile; appointments reference this id.
    pub user_id: Uuid,
    pub full_name: String,
    pub specialty: Option<String>,
    pub consultation_fee: f64,
    #[serde(default)]
    pub availability_schedule: Vec<WeeklyScheduleEntry>,
}

impl DoctorProfile {
    /// The working-hours entry for a weekday, if the doctor is available then.
    pub fn schedule_for(&self, day: DayOfWeek) -> Option<&WeeklyScheduleEntry> {
        self.availability_schedule
            .iter()
            .find(|entry| entry.day == day && entry.is_available)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateScheduleRequest {
    pub availability_schedule: Vec<WeeklyScheduleEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn entry(day: DayOfWeek, available: bool) -> WeeklyScheduleEntry {
        WeeklyScheduleEntry {
            day,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            is_available: available,
        }
    }

    #[test]
    fn schedule_lookup_skips_unavailable_days() {
        let profile = DoctorProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            full_name: "Dr. Test".to_string(),
            specialty: None,
            consultation_fee: 100.0,
            availability_schedule: vec![
                entry(DayOfWeek::Monday, true),
                entry(DayOfWeek::Tuesday, false),
            ],
        };

        assert!(profile.schedule_for(DayOfWeek::Monday).is_some());
        assert!(profile.schedule_for(DayOfWeek::Tuesday).is_none());
        assert!(profile.schedule_for(DayOfWeek::Friday).is_none());
    }

    #[test]
    fn schedule_entry_serializes_times_as_hhmm() {
        let json = serde_json::to_value(entry(DayOfWeek::Monday, true)).unwrap();
        assert_eq!(json["day"], "Monday");
        assert_eq!(json["start_time"], "09:00");
        assert_eq!(json["end_time"], "12:00");
    }

    #[test]
    fn schedule_entry_accepts_seconds_on_input() {
        let entry: WeeklyScheduleEntry = serde_json::from_value(serde_json::json!({
            "day": "Friday",
            "start_time": "08:30:00",
            "end_time": "16:00",
            "is_available": true
        }))
        .unwrap();
        assert_eq!(entry.start_time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(entry.end_time, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    }
}
