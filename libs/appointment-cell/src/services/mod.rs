pub mod availability;
pub mod booking;
pub mod conditions;
pub mod conflict;
pub mod lifecycle;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use conditions::HealthConditionService;
pub use conflict::SlotConflictChecker;
pub use lifecycle::AppointmentLifecycleService;
