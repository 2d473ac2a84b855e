pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{DayOfWeek, DoctorError, DoctorProfile, WeeklyScheduleEntry};
pub use services::DoctorService;
