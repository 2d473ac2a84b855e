use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Governs legal status transitions. Completed, cancelled and no-show are
/// terminal; cancellation is only reachable from the pre-consultation states.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        matches!(
            status,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
        )
    }

    pub fn valid_transitions(&self, current: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::InProgress,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // An in-progress consultation can still be aborted.
            AppointmentStatus::InProgress => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidStatusTransition(current));
        }

        Ok(())
    }

    /// Cancellation gate used by the cancel operation. Derived from the
    /// transition table so the two can never disagree.
    pub fn validate_cancellation(
        &self,
        current: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        self.validate_transition(current, AppointmentStatus::Cancelled)
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
