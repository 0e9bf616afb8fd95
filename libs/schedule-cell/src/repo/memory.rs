// libs/schedule-cell/src/repo/memory.rs
//
// In-memory double used by service-level tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use shared_models::booking::SlotClaim;

use crate::models::{DoctorSchedule, SchedulePatch, ScheduleError};
use crate::repo::ScheduleRepo;

#[derive(Default)]
pub struct InMemoryScheduleRepo {
    schedules: RwLock<HashMap<Uuid, DoctorSchedule>>,
    claims: RwLock<HashMap<(Uuid, NaiveDate), Vec<SlotClaim>>>,
}

impl InMemoryScheduleRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed occupancy data the slot computer should see.
    pub fn seed_claims(&self, doctor_id: Uuid, date: NaiveDate, claims: Vec<SlotClaim>) {
        self.claims.write().unwrap().insert((doctor_id, date), claims);
    }
}

#[async_trait]
impl ScheduleRepo for InMemoryScheduleRepo {
    async fn fetch(
        &self,
        doctor_id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<DoctorSchedule>, ScheduleError> {
        Ok(self.schedules.read().unwrap().get(&doctor_id).cloned())
    }

    async fn insert(
        &self,
        schedule: DoctorSchedule,
        _auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        let mut schedules = self.schedules.write().unwrap();
        if schedules.contains_key(&schedule.doctor_id) {
            return Err(ScheduleError::AlreadyExists);
        }
        schedules.insert(schedule.doctor_id, schedule.clone());
        Ok(schedule)
    }

    async fn update_fields(
        &self,
        doctor_id: Uuid,
        patch: SchedulePatch,
        _auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        let mut schedules = self.schedules.write().unwrap();
        let schedule = schedules.get_mut(&doctor_id).ok_or(ScheduleError::NotFound)?;

        if let Some(weekly) = patch.weekly_schedule {
            schedule.weekly_schedule = weekly;
        }
        if let Some(duration) = patch.default_slot_duration_minutes {
            schedule.default_slot_duration_minutes = duration;
        }
        if let Some(buffer) = patch.buffer_minutes {
            schedule.buffer_minutes = buffer;
        }
        if let Some(blocked) = patch.blocked_dates {
            schedule.blocked_dates = blocked;
        }
        if let Some(exceptions) = patch.recurring_exceptions {
            schedule.recurring_exceptions = exceptions;
        }
        if let Some(is_active) = patch.is_active {
            schedule.is_active = is_active;
        }
        schedule.updated_at = patch.updated_at.unwrap_or_else(Utc::now);

        Ok(schedule.clone())
    }

    async fn delete(&self, doctor_id: Uuid, _auth_token: &str) -> Result<(), ScheduleError> {
        self.schedules.write().unwrap().remove(&doctor_id);
        Ok(())
    }

    async fn slot_claims(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        _auth_token: &str,
    ) -> Result<Vec<SlotClaim>, ScheduleError> {
        Ok(self
            .claims
            .read()
            .unwrap()
            .get(&(doctor_id, date))
            .cloned()
            .unwrap_or_default())
    }
}
