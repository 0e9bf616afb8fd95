pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_models::booking::SlotClaim;

use crate::models::{DoctorSchedule, SchedulePatch, ScheduleError};

pub use memory::InMemoryScheduleRepo;
pub use postgrest::PostgrestScheduleRepo;

/// Persistence seam for doctor schedules and the appointment projection
/// the slot computer needs.
#[async_trait]
pub trait ScheduleRepo: Send + Sync {
    async fn fetch(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<DoctorSchedule>, ScheduleError>;

    /// Fails with `AlreadyExists` when the doctor already has a schedule.
    async fn insert(
        &self,
        schedule: DoctorSchedule,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError>;

    /// Per-field merge; absent fields keep their stored values.
    async fn update_fields(
        &self,
        doctor_id: Uuid,
        patch: SchedulePatch,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError>;

    async fn delete(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), ScheduleError>;

    /// Occupancy projection of the doctor's appointments on a date.
    async fn slot_claims(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<SlotClaim>, ScheduleError>;
}
