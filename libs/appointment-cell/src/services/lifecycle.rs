// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shared_models::booking::{AppointmentStatus, PaymentStatus};

use crate::models::{Appointment, BookingError};

/// Business rules for the appointment lifecycle.
#[derive(Debug, Clone)]
pub struct AppointmentLifecycleRules {
    pub max_reschedule_count: i32,
}

impl Default for AppointmentLifecycleRules {
    fn default() -> Self {
        Self {
            // One reschedule per appointment, hard cap.
            max_reschedule_count: 1,
        }
    }
}

pub struct AppointmentLifecycleService {
    rules: AppointmentLifecycleRules,
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self {
            rules: AppointmentLifecycleRules::default(),
        }
    }

    /// Validate that a status transition is allowed.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), BookingError> {
        debug!(
            "Validating status transition from {} to {}",
            current_status, new_status
        );

        let valid_transitions = self.get_valid_transitions(current_status);

        if !valid_transitions.contains(&new_status) {
            warn!(
                "Invalid status transition attempted: {} -> {}",
                current_status, new_status
            );
            return Err(BookingError::InvalidStatusTransition(current_status));
        }

        Ok(())
    }

    /// All valid next statuses for a given current status.
    pub fn get_valid_transitions(
        &self,
        current_status: AppointmentStatus,
    ) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Rejected,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::RescheduleRequested,
            ],
            // Awaiting the doctor's verdict on the proposed new time.
            AppointmentStatus::RescheduleRequested => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Rejected,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states admit nothing.
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::Rejected => vec![],
        }
    }

    /// Guard for a patient proposing a new time.
    pub fn validate_reschedule(&self, appointment: &Appointment) -> Result<(), BookingError> {
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }
        if appointment.reschedule_count >= self.rules.max_reschedule_count {
            warn!(
                "Reschedule limit reached for appointment {}",
                appointment.id
            );
            return Err(BookingError::RescheduleLimitReached);
        }
        Ok(())
    }

    /// Guard for the session-status transition: same-day, confirmed,
    /// paid.
    pub fn validate_consultation_start(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }
        if appointment.payment_status != PaymentStatus::Paid {
            return Err(BookingError::ValidationError(
                "Consultation requires a paid appointment".to_string(),
            ));
        }
        if appointment.appointment_date != now.date_naive() {
            return Err(BookingError::ValidationError(
                "Consultation can only start on the appointment day".to_string(),
            ));
        }
        Ok(())
    }

    /// Cancellation and rejection both demand a stated reason.
    pub fn validate_reason(&self, reason: &str) -> Result<(), BookingError> {
        if reason.trim().is_empty() {
            return Err(BookingError::ReasonRequired);
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared_models::booking::{AppointmentType, SlotTime};
    use uuid::Uuid;

    fn appointment(status: AppointmentStatus, payment: PaymentStatus) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            custom_id: "APT-20260105-TEST01".to_string(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            appointment_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            appointment_time: "09:00-09:30".parse::<SlotTime>().unwrap(),
            appointment_type: AppointmentType::Video,
            status,
            payment_status: payment,
            checkout_lock_until: None,
            gateway_order_id: None,
            payment_id: None,
            consultation_fees: Some(1000),
            doctor_earnings: None,
            admin_commission: None,
            reschedule_count: 0,
            cancellation_reason: None,
            rejection_reason: None,
            notes: None,
            chat_enabled: false,
            consultation_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_can_confirm_reject_or_cancel() {
        let service = AppointmentLifecycleService::new();
        for target in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Rejected,
            AppointmentStatus::Cancelled,
        ] {
            assert!(service
                .validate_status_transition(AppointmentStatus::Pending, target)
                .is_ok());
        }
        assert!(service
            .validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Completed)
            .is_err());
    }

    #[test]
    fn terminal_states_admit_nothing() {
        let service = AppointmentLifecycleService::new();
        for terminal in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rejected,
        ] {
            assert!(service.get_valid_transitions(terminal).is_empty());
        }
    }

    #[test]
    fn completion_only_from_confirmed() {
        let service = AppointmentLifecycleService::new();
        assert!(service
            .validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Completed)
            .is_ok());
        assert!(service
            .validate_status_transition(
                AppointmentStatus::RescheduleRequested,
                AppointmentStatus::Completed
            )
            .is_err());
    }

    #[test]
    fn reschedule_cap_is_one() {
        let service = AppointmentLifecycleService::new();
        let mut appt = appointment(AppointmentStatus::Confirmed, PaymentStatus::Paid);
        assert!(service.validate_reschedule(&appt).is_ok());

        appt.reschedule_count = 1;
        assert!(matches!(
            service.validate_reschedule(&appt),
            Err(BookingError::RescheduleLimitReached)
        ));
    }

    #[test]
    fn reschedule_requires_confirmed_status() {
        let service = AppointmentLifecycleService::new();
        let appt = appointment(AppointmentStatus::Pending, PaymentStatus::Paid);
        assert!(matches!(
            service.validate_reschedule(&appt),
            Err(BookingError::InvalidStatusTransition(_))
        ));
    }

    #[test]
    fn consultation_start_needs_same_day_paid_confirmed() {
        let service = AppointmentLifecycleService::new();
        let appt = appointment(AppointmentStatus::Confirmed, PaymentStatus::Paid);

        let same_day = appt
            .appointment_date
            .and_hms_opt(8, 0, 0)
            .unwrap()
            .and_utc();
        assert!(service.validate_consultation_start(&appt, same_day).is_ok());

        let other_day = same_day + chrono::Duration::days(1);
        assert!(service
            .validate_consultation_start(&appt, other_day)
            .is_err());

        let unpaid = appointment(AppointmentStatus::Confirmed, PaymentStatus::Pending);
        assert!(service.validate_consultation_start(&unpaid, same_day).is_err());
    }

    #[test]
    fn empty_reason_is_rejected() {
        let service = AppointmentLifecycleService::new();
        assert!(matches!(
            service.validate_reason("   "),
            Err(BookingError::ReasonRequired)
        ));
        assert!(service.validate_reason("patient request").is_ok());
    }
}
