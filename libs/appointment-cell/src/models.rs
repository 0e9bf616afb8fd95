// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use payment_cell::models::PaymentError;
use schedule_cell::models::ScheduleError;
use shared_models::booking::{
    AppointmentStatus, AppointmentType, PaymentStatus, SlotClaim, SlotTime,
};

// ==============================================================================
// CORE APPOINTMENT MODEL
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Human-readable booking reference, e.g. `APT-20260105-X4K2QD`.
    pub custom_id: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: SlotTime,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    /// Soft checkout reservation; a past timestamp means no lock.
    pub checkout_lock_until: Option<DateTime<Utc>>,
    pub gateway_order_id: Option<String>,
    pub payment_id: Option<String>,
    /// Fee in integer major units, fixed at order creation.
    pub consultation_fees: Option<i64>,
    pub doctor_earnings: Option<i64>,
    pub admin_commission: Option<i64>,
    pub reschedule_count: i32,
    pub cancellation_reason: Option<String>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub chat_enabled: bool,
    pub consultation_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Occupancy projection used by the conflict query and the slot
    /// computer.
    pub fn claim(&self) -> SlotClaim {
        SlotClaim {
            appointment_time: self.appointment_time,
            status: self.status,
            payment_status: self.payment_status,
            checkout_lock_until: self.checkout_lock_until,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: SlotTime,
    pub appointment_type: AppointmentType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
    /// Doctor/admin may flag the cancellation as a patient no-show,
    /// which forfeits the refund.
    #[serde(default)]
    pub no_show: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_time: SlotTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachNotesRequest {
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub appointment_id: Uuid,
    /// Major units.
    pub amount: i64,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderResponse {
    pub key_id: String,
    pub order_id: String,
    /// Minor units, as the checkout widget expects.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub appointment_id: Uuid,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentResponse {
    pub appointment_id: Uuid,
    pub payment_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnlockSlotRequest {
    pub appointment_id: Uuid,
}

/// Per-field update; absent fields keep their stored values. The
/// double-`Option` on `checkout_lock_until` distinguishes "leave alone"
/// from "write null".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<SlotTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_lock_until: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_fees: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Requested slot is not bookable")]
    SlotNotAvailable,

    #[error("Slot already taken")]
    SlotTaken,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Appointment has already been rescheduled once")]
    RescheduleLimitReached,

    #[error("A reason is required")]
    ReasonRequired,

    #[error("Appointment is already paid")]
    AlreadyPaid,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
