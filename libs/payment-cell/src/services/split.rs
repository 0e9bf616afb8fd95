// libs/payment-cell/src/services/split.rs
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::policy::{BookingPolicy, CancellationInitiator};

use crate::models::{
    CommissionSplit, LedgerCategory, PaymentError, RefundBreakdown, WalletLedgerEntry,
};
use crate::repo::WalletRepo;

/// Splits verified payments and cancellation refunds into wallet ledger
/// entries. This service is the only writer of the ledger.
pub struct PaymentSplitEngine {
    wallet: Arc<dyn WalletRepo>,
    policy: BookingPolicy,
    platform_account_id: Uuid,
}

impl PaymentSplitEngine {
    pub fn new(wallet: Arc<dyn WalletRepo>, policy: BookingPolicy, platform_account_id: Uuid) -> Self {
        Self {
            wallet,
            policy,
            platform_account_id,
        }
    }

    /// Integer commission split. The doctor's share is floored and the
    /// platform takes the remainder, so the two legs always reconstruct
    /// the fee exactly.
    pub fn split_fee(&self, consultation_fees: i64) -> CommissionSplit {
        let doctor_earnings = consultation_fees * self.policy.doctor_commission_percent / 100;
        CommissionSplit {
            doctor_earnings,
            admin_commission: consultation_fees - doctor_earnings,
        }
    }

    /// Refund division for a cancellation. Compensation legs are floored
    /// and the patient absorbs the remainder.
    pub fn refund_breakdown(
        &self,
        consultation_fees: i64,
        initiator: CancellationInitiator,
    ) -> RefundBreakdown {
        let split = self.policy.refund_split(initiator);
        let admin_compensation = consultation_fees * split.admin_percent / 100;
        let doctor_compensation = consultation_fees * split.doctor_percent / 100;
        RefundBreakdown {
            patient_refund: consultation_fees - admin_compensation - doctor_compensation,
            admin_compensation,
            doctor_compensation,
        }
    }

    /// Record the two ledger entries for a verified payment.
    pub async fn record_payment_split(
        &self,
        appointment_id: Uuid,
        booking_reference: &str,
        doctor_id: Uuid,
        consultation_fees: i64,
        auth_token: &str,
    ) -> Result<CommissionSplit, PaymentError> {
        let split = self.split_fee(consultation_fees);
        debug!(
            "Splitting fee {} for appointment {}: doctor {}, platform {}",
            consultation_fees, appointment_id, split.doctor_earnings, split.admin_commission
        );

        self.append_entry(
            doctor_id,
            split.doctor_earnings,
            format!("Consultation earnings for booking {}", booking_reference),
            appointment_id,
            LedgerCategory::ConsultationEarnings,
            auth_token,
        )
        .await?;

        self.append_entry(
            self.platform_account_id,
            split.admin_commission,
            format!("Platform commission for booking {}", booking_reference),
            appointment_id,
            LedgerCategory::PlatformCommission,
            auth_token,
        )
        .await?;

        info!(
            "Recorded payment split for appointment {} ({} + {})",
            appointment_id, split.doctor_earnings, split.admin_commission
        );
        Ok(split)
    }

    /// Record the refund/compensation entries for a cancelled paid
    /// appointment. Zero-amount legs are skipped.
    pub async fn record_refund(
        &self,
        appointment_id: Uuid,
        booking_reference: &str,
        patient_id: Uuid,
        doctor_id: Uuid,
        consultation_fees: i64,
        initiator: CancellationInitiator,
        auth_token: &str,
    ) -> Result<RefundBreakdown, PaymentError> {
        let breakdown = self.refund_breakdown(consultation_fees, initiator);

        if breakdown.patient_refund > 0 {
            self.append_entry(
                patient_id,
                breakdown.patient_refund,
                format!("Refund for cancelled booking {}", booking_reference),
                appointment_id,
                LedgerCategory::Refund,
                auth_token,
            )
            .await?;
        }

        if breakdown.admin_compensation > 0 {
            self.append_entry(
                self.platform_account_id,
                breakdown.admin_compensation,
                format!("Cancellation compensation for booking {}", booking_reference),
                appointment_id,
                LedgerCategory::CancellationCompensation,
                auth_token,
            )
            .await?;
        }

        if breakdown.doctor_compensation > 0 {
            self.append_entry(
                doctor_id,
                breakdown.doctor_compensation,
                format!("Cancellation compensation for booking {}", booking_reference),
                appointment_id,
                LedgerCategory::CancellationCompensation,
                auth_token,
            )
            .await?;
        }

        info!(
            "Recorded {:?} cancellation refund for appointment {}: patient {}, platform {}, doctor {}",
            initiator,
            appointment_id,
            breakdown.patient_refund,
            breakdown.admin_compensation,
            breakdown.doctor_compensation
        );
        Ok(breakdown)
    }

    async fn append_entry(
        &self,
        owner_user_id: Uuid,
        amount: i64,
        description: String,
        related_appointment_id: Uuid,
        category: LedgerCategory,
        auth_token: &str,
    ) -> Result<(), PaymentError> {
        self.wallet
            .append(
                WalletLedgerEntry {
                    id: Uuid::new_v4(),
                    owner_user_id,
                    amount,
                    description,
                    related_appointment_id,
                    category,
                    created_at: Utc::now(),
                },
                auth_token,
            )
            .await
    }
}
