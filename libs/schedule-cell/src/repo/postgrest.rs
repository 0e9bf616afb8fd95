// libs/schedule-cell/src/repo/postgrest.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::booking::SlotClaim;

use crate::models::{DoctorSchedule, SchedulePatch, ScheduleError};
use crate::repo::ScheduleRepo;

pub struct PostgrestScheduleRepo {
    supabase: Arc<SupabaseClient>,
}

impl PostgrestScheduleRepo {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    fn parse_schedule(value: Value) -> Result<DoctorSchedule, ScheduleError> {
        serde_json::from_value(value)
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))
    }
}

#[async_trait]
impl ScheduleRepo for PostgrestScheduleRepo {
    async fn fetch(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<DoctorSchedule>, ScheduleError> {
        debug!("Fetching schedule for doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(value) => Ok(Some(Self::parse_schedule(value)?)),
            None => Ok(None),
        }
    }

    async fn insert(
        &self,
        schedule: DoctorSchedule,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        debug!("Creating schedule for doctor: {}", schedule.doctor_id);

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_schedules",
                Some(auth_token),
                Some(json!(schedule)),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| {
                let message = e.to_string();
                // The table carries a unique constraint on doctor_id.
                if message.contains("Conflict") || message.contains("duplicate key") {
                    ScheduleError::AlreadyExists
                } else {
                    ScheduleError::DatabaseError(message)
                }
            })?;

        result
            .into_iter()
            .next()
            .map(Self::parse_schedule)
            .transpose()?
            .ok_or_else(|| ScheduleError::DatabaseError("Schedule creation returned no row".into()))
    }

    async fn update_fields(
        &self,
        doctor_id: Uuid,
        patch: SchedulePatch,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        debug!("Updating schedule for doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!(patch)),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(Self::parse_schedule)
            .transpose()?
            .ok_or(ScheduleError::NotFound)
    }

    async fn delete(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), ScheduleError> {
        debug!("Deleting schedule for doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn slot_claims(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<SlotClaim>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&select=appointment_time,status,payment_status,checkout_lock_until",
            doctor_id, date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<SlotClaim>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse claims: {}", e)))
    }
}
