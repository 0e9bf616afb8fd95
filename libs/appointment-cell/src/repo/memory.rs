// libs/appointment-cell/src/repo/memory.rs
//
// In-memory double. `claim_slot_for_checkout` and `mark_paid` run their
// check and write under one mutex guard, which is the reference
// semantics the concurrency tests assert against.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use shared_models::booking::{PaymentStatus, SlotClaim, SlotTime};

use crate::models::{Appointment, AppointmentPatch, BookingError};
use crate::repo::{AppointmentRepo, SlotClaimOutcome};

#[derive(Default)]
pub struct InMemoryAppointmentRepo {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, appointment: Appointment) {
        self.appointments
            .lock()
            .unwrap()
            .insert(appointment.id, appointment);
    }

    pub fn get(&self, id: Uuid) -> Option<Appointment> {
        self.appointments.lock().unwrap().get(&id).cloned()
    }
}

fn apply_patch(appointment: &mut Appointment, patch: AppointmentPatch) {
    if let Some(date) = patch.appointment_date {
        appointment.appointment_date = date;
    }
    if let Some(time) = patch.appointment_time {
        appointment.appointment_time = time;
    }
    if let Some(status) = patch.status {
        appointment.status = status;
    }
    if let Some(payment_status) = patch.payment_status {
        appointment.payment_status = payment_status;
    }
    if let Some(lock) = patch.checkout_lock_until {
        appointment.checkout_lock_until = lock;
    }
    if let Some(order_id) = patch.gateway_order_id {
        appointment.gateway_order_id = Some(order_id);
    }
    if let Some(fees) = patch.consultation_fees {
        appointment.consultation_fees = Some(fees);
    }
    if let Some(count) = patch.reschedule_count {
        appointment.reschedule_count = count;
    }
    if let Some(reason) = patch.cancellation_reason {
        appointment.cancellation_reason = Some(reason);
    }
    if let Some(reason) = patch.rejection_reason {
        appointment.rejection_reason = Some(reason);
    }
    if let Some(notes) = patch.notes {
        appointment.notes = Some(notes);
    }
    if let Some(enabled) = patch.chat_enabled {
        appointment.chat_enabled = enabled;
    }
    if let Some(started) = patch.consultation_started_at {
        appointment.consultation_started_at = Some(started);
    }
    appointment.updated_at = patch.updated_at.unwrap_or_else(Utc::now);
}

#[async_trait]
impl AppointmentRepo for InMemoryAppointmentRepo {
    async fn insert(
        &self,
        appointment: Appointment,
        _auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.appointments
            .lock()
            .unwrap()
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn fetch(
        &self,
        id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<Appointment>, BookingError> {
        Ok(self.appointments.lock().unwrap().get(&id).cloned())
    }

    async fn slot_claims(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotTime,
        exclude_id: Option<Uuid>,
        _auth_token: &str,
    ) -> Result<Vec<SlotClaim>, BookingError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id
                    && a.appointment_date == date
                    && a.appointment_time == slot
                    && Some(a.id) != exclude_id
            })
            .map(|a| a.claim())
            .collect())
    }

    async fn claim_slot_for_checkout(
        &self,
        id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotTime,
        lock_until: DateTime<Utc>,
        now: DateTime<Utc>,
        _auth_token: &str,
    ) -> Result<SlotClaimOutcome, BookingError> {
        let mut appointments = self.appointments.lock().unwrap();

        let taken = appointments.values().any(|a| {
            a.doctor_id == doctor_id
                && a.appointment_date == date
                && a.appointment_time == slot
                && a.id != id
                && a.claim().blocks_slot(now)
        });
        if taken {
            return Ok(SlotClaimOutcome::SlotTaken);
        }

        let appointment = appointments.get_mut(&id).ok_or(BookingError::NotFound)?;
        if appointment.payment_status != PaymentStatus::Pending {
            return Ok(SlotClaimOutcome::SlotTaken);
        }
        // Mirror the conditional-update filter: a live lock from an
        // earlier attempt is not re-acquired here.
        if appointment
            .checkout_lock_until
            .map_or(false, |until| until > now)
        {
            return Ok(SlotClaimOutcome::SlotTaken);
        }

        appointment.checkout_lock_until = Some(lock_until);
        appointment.updated_at = now;
        Ok(SlotClaimOutcome::Acquired)
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        payment_id: &str,
        doctor_earnings: i64,
        admin_commission: i64,
        _auth_token: &str,
    ) -> Result<bool, BookingError> {
        let mut appointments = self.appointments.lock().unwrap();
        let appointment = appointments.get_mut(&id).ok_or(BookingError::NotFound)?;

        if appointment.payment_status != PaymentStatus::Pending {
            return Ok(false);
        }

        appointment.payment_status = PaymentStatus::Paid;
        appointment.payment_id = Some(payment_id.to_string());
        appointment.doctor_earnings = Some(doctor_earnings);
        appointment.admin_commission = Some(admin_commission);
        appointment.checkout_lock_until = None;
        appointment.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_lock(&self, id: Uuid, _auth_token: &str) -> Result<(), BookingError> {
        if let Some(appointment) = self.appointments.lock().unwrap().get_mut(&id) {
            appointment.checkout_lock_until = None;
            appointment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        _auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let mut appointments = self.appointments.lock().unwrap();
        let appointment = appointments.get_mut(&id).ok_or(BookingError::NotFound)?;
        apply_patch(appointment, patch);
        Ok(appointment.clone())
    }
}
