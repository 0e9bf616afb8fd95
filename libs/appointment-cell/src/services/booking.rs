// libs/appointment-cell/src/services/booking.rs
use chrono::{NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use payment_cell::repo::PostgrestWalletRepo;
use payment_cell::services::split::PaymentSplitEngine;
use schedule_cell::repo::{PostgrestScheduleRepo, ScheduleRepo};
use schedule_cell::services::slots::compute_day_slots;
use shared_config::policy::{BookingPolicy, CancellationInitiator};
use shared_config::AppConfig;
use shared_models::booking::{AppointmentStatus, PaymentStatus, SlotTime};

use crate::models::{
    Appointment, AppointmentPatch, BookingError, CancelAppointmentRequest,
    CreateAppointmentRequest, RejectAppointmentRequest, RescheduleAppointmentRequest,
};
use crate::repo::{AppointmentRepo, PostgrestAppointmentRepo};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notify::{Notifier, TracingNotifier};

pub struct AppointmentBookingService {
    repo: Arc<dyn AppointmentRepo>,
    schedules: Arc<dyn ScheduleRepo>,
    lifecycle: AppointmentLifecycleService,
    split_engine: PaymentSplitEngine,
    notifier: Arc<dyn Notifier>,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let wallet = Arc::new(PostgrestWalletRepo::new(config));
        let platform_account_id =
            Uuid::parse_str(&config.platform_account_id).unwrap_or_else(|_| Uuid::nil());

        Self {
            repo: Arc::new(PostgrestAppointmentRepo::new(config)),
            schedules: Arc::new(PostgrestScheduleRepo::new(config)),
            lifecycle: AppointmentLifecycleService::new(),
            split_engine: PaymentSplitEngine::new(
                wallet,
                BookingPolicy::default(),
                platform_account_id,
            ),
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_parts(
        repo: Arc<dyn AppointmentRepo>,
        schedules: Arc<dyn ScheduleRepo>,
        split_engine: PaymentSplitEngine,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            schedules,
            lifecycle: AppointmentLifecycleService::new(),
            split_engine,
            notifier,
        }
    }

    /// Create a pending appointment on a bookable slot.
    pub async fn create_appointment(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {} {}",
            patient_id, request.doctor_id, request.appointment_date, request.appointment_time
        );

        let now = Utc::now();
        if request.appointment_date < now.date_naive() {
            return Err(BookingError::ValidationError(
                "Appointment date must not be in the past".to_string(),
            ));
        }

        self.validate_slot_is_bookable(
            request.doctor_id,
            request.appointment_date,
            request.appointment_time,
            auth_token,
        )
        .await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            custom_id: generate_booking_reference(request.appointment_date),
            patient_id,
            doctor_id: request.doctor_id,
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            appointment_type: request.appointment_type,
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Pending,
            checkout_lock_until: None,
            gateway_order_id: None,
            payment_id: None,
            consultation_fees: None,
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
        };

        let appointment = self.repo.insert(appointment, auth_token).await?;

        self.notifier.notify(
            appointment.doctor_id,
            "appointment_requested",
            &format!("New appointment request {}", appointment.custom_id),
        );

        info!(
            "Appointment {} created as {}",
            appointment.id, appointment.custom_id
        );
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        debug!("Fetching appointment: {}", appointment_id);
        self.repo
            .fetch(appointment_id, auth_token)
            .await?
            .ok_or(BookingError::NotFound)
    }

    /// Doctor approval: pending (or a proposed reschedule) becomes
    /// confirmed.
    pub async fn approve(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Confirmed)?;

        let updated = self
            .repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Confirmed),
                    updated_at: Some(Utc::now()),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await?;

        self.notifier.notify(
            updated.patient_id,
            "appointment_confirmed",
            &format!("Appointment {} confirmed", updated.custom_id),
        );
        Ok(updated)
    }

    /// Doctor rejection, allowed before confirmation and on a proposed
    /// reschedule. A paid appointment is refunded in full.
    pub async fn reject(
        &self,
        appointment_id: Uuid,
        request: RejectAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.lifecycle.validate_reason(&request.reason)?;

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Rejected)?;

        if appointment.payment_status == PaymentStatus::Paid {
            self.settle_refund(&appointment, CancellationInitiator::Doctor, auth_token)
                .await?;
        }

        let updated = self
            .repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Rejected),
                    rejection_reason: Some(request.reason),
                    payment_status: (appointment.payment_status == PaymentStatus::Paid)
                        .then_some(PaymentStatus::Refunded),
                    checkout_lock_until: Some(None),
                    updated_at: Some(Utc::now()),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await?;

        self.notifier.notify(
            updated.patient_id,
            "appointment_rejected",
            &format!("Appointment {} was rejected", updated.custom_id),
        );
        Ok(updated)
    }

    /// Cancellation by patient, doctor or admin. Paid appointments are
    /// settled through the refund table for the initiator.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        initiator: CancellationInitiator,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.lifecycle.validate_reason(&request.reason)?;

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let was_paid = appointment.payment_status == PaymentStatus::Paid;
        if was_paid {
            self.settle_refund(&appointment, initiator, auth_token).await?;
        }

        let updated = self
            .repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Cancelled),
                    cancellation_reason: Some(request.reason),
                    payment_status: was_paid.then_some(PaymentStatus::Refunded),
                    checkout_lock_until: Some(None),
                    updated_at: Some(Utc::now()),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await?;

        info!(
            "Appointment {} cancelled ({:?})",
            appointment_id, initiator
        );
        self.notifier.notify(
            updated.patient_id,
            "appointment_cancelled",
            &format!("Appointment {} cancelled", updated.custom_id),
        );
        self.notifier.notify(
            updated.doctor_id,
            "appointment_cancelled",
            &format!("Appointment {} cancelled", updated.custom_id),
        );
        Ok(updated)
    }

    /// Patient proposes a new date/time for a confirmed appointment. One
    /// reschedule per appointment; the new slot must be bookable.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_reschedule(&appointment)?;

        if request.new_date < Utc::now().date_naive() {
            return Err(BookingError::ValidationError(
                "New appointment date must not be in the past".to_string(),
            ));
        }

        self.validate_slot_is_bookable(
            appointment.doctor_id,
            request.new_date,
            request.new_time,
            auth_token,
        )
        .await?;

        let updated = self
            .repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    appointment_date: Some(request.new_date),
                    appointment_time: Some(request.new_time),
                    status: Some(AppointmentStatus::RescheduleRequested),
                    reschedule_count: Some(appointment.reschedule_count + 1),
                    updated_at: Some(Utc::now()),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await?;

        self.notifier.notify(
            updated.doctor_id,
            "reschedule_requested",
            &format!(
                "Appointment {} proposed for {} {}",
                updated.custom_id, updated.appointment_date, updated.appointment_time
            ),
        );
        Ok(updated)
    }

    /// Completion by the assigned doctor, from confirmed only.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        let updated = self
            .repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Completed),
                    updated_at: Some(Utc::now()),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await?;

        self.notifier.notify(
            updated.patient_id,
            "appointment_completed",
            &format!("Appointment {} completed", updated.custom_id),
        );
        Ok(updated)
    }

    /// Session-status transition; permitted only on same-day, confirmed,
    /// paid appointments.
    pub async fn start_consultation(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let now = Utc::now();
        self.lifecycle.validate_consultation_start(&appointment, now)?;

        if appointment.consultation_started_at.is_some() {
            return Ok(appointment);
        }

        self.repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    consultation_started_at: Some(now),
                    updated_at: Some(now),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await
    }

    /// Chat side channel, doctor-controlled and independent of status.
    pub async fn set_chat_enabled(
        &self,
        appointment_id: Uuid,
        enabled: bool,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.get_appointment(appointment_id, auth_token).await?;

        self.repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    chat_enabled: Some(enabled),
                    updated_at: Some(Utc::now()),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await
    }

    /// Notes may be attached even after the appointment closed; it is the
    /// only post-terminal mutation.
    pub async fn attach_notes(
        &self,
        appointment_id: Uuid,
        notes: String,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        if notes.trim().is_empty() {
            return Err(BookingError::ValidationError(
                "Notes cannot be empty".to_string(),
            ));
        }
        self.get_appointment(appointment_id, auth_token).await?;

        self.repo
            .update_fields(
                appointment_id,
                AppointmentPatch {
                    notes: Some(notes),
                    updated_at: Some(Utc::now()),
                    ..AppointmentPatch::default()
                },
                auth_token,
            )
            .await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn validate_slot_is_bookable(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotTime,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let Some(schedule) = self.schedules.fetch(doctor_id, auth_token).await? else {
            // No schedule means no slots.
            return Err(BookingError::SlotNotAvailable);
        };

        let claims = self.schedules.slot_claims(doctor_id, date, auth_token).await?;
        let slots = compute_day_slots(&schedule, date, &claims, Utc::now());

        match slots.iter().find(|s| s.time() == slot) {
            None => Err(BookingError::SlotNotAvailable),
            Some(day_slot) if !day_slot.available => Err(BookingError::SlotTaken),
            Some(_) => Ok(()),
        }
    }

    async fn settle_refund(
        &self,
        appointment: &Appointment,
        initiator: CancellationInitiator,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let fees = appointment.consultation_fees.ok_or_else(|| {
            BookingError::DatabaseError("Paid appointment has no recorded fee".to_string())
        })?;

        self.split_engine
            .record_refund(
                appointment.id,
                &appointment.custom_id,
                appointment.patient_id,
                appointment.doctor_id,
                fees,
                initiator,
                auth_token,
            )
            .await?;
        Ok(())
    }
}

fn generate_booking_reference(date: NaiveDate) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("APT-{}-{}", date.format("%Y%m%d"), suffix)
}
