// libs/payment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// WALLET LEDGER
// ==============================================================================

/// Append-only ledger line. Amounts are signed integer major units; the
/// split engine is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletLedgerEntry {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub amount: i64,
    pub description: String,
    pub related_appointment_id: Uuid,
    pub category: LedgerCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerCategory {
    ConsultationEarnings,
    PlatformCommission,
    Refund,
    CancellationCompensation,
}

impl fmt::Display for LedgerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerCategory::ConsultationEarnings => write!(f, "consultation_earnings"),
            LedgerCategory::PlatformCommission => write!(f, "platform_commission"),
            LedgerCategory::Refund => write!(f, "refund"),
            LedgerCategory::CancellationCompensation => write!(f, "cancellation_compensation"),
        }
    }
}

// ==============================================================================
// GATEWAY ORDER MODELS
// ==============================================================================

/// Order as returned by the payment gateway. `amount` is in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

// ==============================================================================
// SPLIT RESULTS
// ==============================================================================

/// Division of a paid fee between the doctor and the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub doctor_earnings: i64,
    pub admin_commission: i64,
}

/// Division of a paid fee on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundBreakdown {
    pub patient_refund: i64,
    pub admin_compensation: i64,
    pub doctor_compensation: i64,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Payment signature verification failed")]
    SignatureMismatch,

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
