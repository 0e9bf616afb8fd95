pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_models::booking::{SlotClaim, SlotTime};

use crate::models::{Appointment, AppointmentPatch, BookingError};

pub use memory::InMemoryAppointmentRepo;
pub use postgrest::PostgrestAppointmentRepo;

/// Result of the compound conflict-check + lock-write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClaimOutcome {
    Acquired,
    SlotTaken,
}

/// Persistence seam for appointments. The checkout-critical operations
/// (`claim_slot_for_checkout`, `mark_paid`) are conditional writes: the
/// check and the write travel together so interleaved requests cannot
/// slip between them.
#[async_trait]
pub trait AppointmentRepo: Send + Sync {
    async fn insert(
        &self,
        appointment: Appointment,
        auth_token: &str,
    ) -> Result<Appointment, BookingError>;

    async fn fetch(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, BookingError>;

    /// Occupancy projection of every other appointment on the same
    /// doctor/date/slot triple.
    async fn slot_claims(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotTime,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<SlotClaim>, BookingError>;

    /// Acquire the checkout lock for `id` if, at this instant, no other
    /// appointment holds the slot and this one is unpaid with no live
    /// lock held by a previous attempt. One call, one decision.
    async fn claim_slot_for_checkout(
        &self,
        id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotTime,
        lock_until: DateTime<Utc>,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<SlotClaimOutcome, BookingError>;

    /// Flip `pending → paid` and persist the split, only if still
    /// pending. Returns false when the payment was already recorded.
    async fn mark_paid(
        &self,
        id: Uuid,
        payment_id: &str,
        doctor_earnings: i64,
        admin_commission: i64,
        auth_token: &str,
    ) -> Result<bool, BookingError>;

    /// Clear the checkout lock. Always succeeds, locked or not.
    async fn release_lock(&self, id: Uuid, auth_token: &str) -> Result<(), BookingError>;

    async fn update_fields(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        auth_token: &str,
    ) -> Result<Appointment, BookingError>;
}
