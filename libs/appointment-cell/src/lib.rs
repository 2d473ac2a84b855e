pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Appointment, AppointmentError, AppointmentReason, AppointmentStatus, AvailabilityDay,
    PaymentInfo, PaymentStatus, ReasonType, Slot,
};
pub use services::{
    AppointmentBookingService, AppointmentLifecycleService, AvailabilityService,
    HealthConditionService, SlotConflictChecker,
};
