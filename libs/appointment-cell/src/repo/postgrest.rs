// libs/appointment-cell/src/repo/postgrest.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::booking::{SlotClaim, SlotTime};

use crate::models::{Appointment, AppointmentPatch, BookingError};
use crate::repo::{AppointmentRepo, SlotClaimOutcome};

pub struct PostgrestAppointmentRepo {
    supabase: Arc<SupabaseClient>,
}

impl PostgrestAppointmentRepo {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    fn parse_appointment(value: Value) -> Result<Appointment, BookingError> {
        serde_json::from_value(value)
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}

#[async_trait]
impl AppointmentRepo for PostgrestAppointmentRepo {
    async fn insert(
        &self,
        appointment: Appointment,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        debug!("Creating appointment {} ({})", appointment.id, appointment.custom_id);

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(json!(appointment)),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(Self::parse_appointment)
            .transpose()?
            .ok_or_else(|| {
                BookingError::DatabaseError("Appointment creation returned no row".into())
            })
    }

    async fn fetch(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(value) => Ok(Some(Self::parse_appointment(value)?)),
            None => Ok(None),
        }
    }

    async fn slot_claims(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotTime,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<SlotClaim>, BookingError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("appointment_date=eq.{}", date),
            format!(
                "appointment_time=eq.{}",
                urlencoding::encode(&slot.to_string())
            ),
        ];
        if let Some(exclude) = exclude_id {
            query_parts.push(format!("id=neq.{}", exclude));
        }

        let path = format!(
            "/rest/v1/appointments?{}&select=appointment_time,status,payment_status,checkout_lock_until",
            query_parts.join("&")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<SlotClaim>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse claims: {}", e)))
    }

    async fn claim_slot_for_checkout(
        &self,
        id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotTime,
        lock_until: DateTime<Utc>,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<SlotClaimOutcome, BookingError> {
        // Step 1: conflict query over the other appointments on the triple.
        let claims = self
            .slot_claims(doctor_id, date, slot, Some(id), auth_token)
            .await?;
        if claims.iter().any(|c| c.blocks_slot(now)) {
            warn!(
                "Slot {} on {} for doctor {} already held",
                slot, date, doctor_id
            );
            return Ok(SlotClaimOutcome::SlotTaken);
        }

        // Step 2: conditional lock write on our own row. The filter only
        // matches while the appointment is unpaid and its previous lock
        // (if any) has expired; an empty representation means the
        // predicate lost the race. The partial unique index on the
        // active-claim triple backstops what the two steps cannot see.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&payment_status=eq.pending&or=(checkout_lock_until.is.null,checkout_lock_until.lt.{})",
            id,
            urlencoding::encode(&now.to_rfc3339())
        );

        let result: Result<Vec<Value>, _> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "checkout_lock_until": lock_until.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                })),
                Some(SupabaseClient::representation_headers()),
            )
            .await;

        match result {
            Ok(rows) if rows.is_empty() => Ok(SlotClaimOutcome::SlotTaken),
            Ok(_) => Ok(SlotClaimOutcome::Acquired),
            Err(e) => {
                let message = e.to_string();
                if message.contains("Conflict") || message.contains("duplicate key") {
                    Ok(SlotClaimOutcome::SlotTaken)
                } else {
                    Err(BookingError::DatabaseError(message))
                }
            }
        }
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        payment_id: &str,
        doctor_earnings: i64,
        admin_commission: i64,
        auth_token: &str,
    ) -> Result<bool, BookingError> {
        // Conditional flip: only a still-pending payment can become paid,
        // so a replayed verification matches nothing and reports false.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&payment_status=eq.pending",
            id
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "payment_status": "paid",
                    "payment_id": payment_id,
                    "doctor_earnings": doctor_earnings,
                    "admin_commission": admin_commission,
                    "checkout_lock_until": null,
                    "updated_at": Utc::now().to_rfc3339()
                })),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn release_lock(&self, id: Uuid, auth_token: &str) -> Result<(), BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let _: Vec<Value> = self
            .supabase
            .request(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "checkout_lock_until": null,
                    "updated_at": Utc::now().to_rfc3339()
                })),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
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
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(Self::parse_appointment)
            .transpose()?
            .ok_or(BookingError::NotFound)
    }
}
