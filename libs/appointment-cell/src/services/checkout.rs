// libs/appointment-cell/src/services/checkout.rs
//
// Checkout orchestration: soft slot locking around the payment attempt,
// gateway order creation, signature verification and the paid-state
// transition with its ledger split.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use payment_cell::models::PaymentError;
use payment_cell::repo::PostgrestWalletRepo;
use payment_cell::services::gateway::{PaymentGateway, RazorpayClient};
use payment_cell::services::signature::verify_payment_signature;
use payment_cell::services::split::PaymentSplitEngine;
use shared_config::policy::BookingPolicy;
use shared_config::AppConfig;
use shared_models::booking::PaymentStatus;

use crate::models::{
    Appointment, BookingError, CreateOrderResponse, VerifyPaymentResponse,
};
use crate::repo::{AppointmentRepo, PostgrestAppointmentRepo, SlotClaimOutcome};
use crate::services::notify::{Notifier, TracingNotifier};

pub struct CheckoutService {
    repo: Arc<dyn AppointmentRepo>,
    gateway: Arc<dyn PaymentGateway>,
    split_engine: PaymentSplitEngine,
    notifier: Arc<dyn Notifier>,
    policy: BookingPolicy,
    gateway_key_secret: String,
    platform_account_id: Uuid,
}

impl CheckoutService {
    pub fn new(config: &AppConfig) -> Result<Self, BookingError> {
        let gateway = RazorpayClient::new(config).map_err(BookingError::Payment)?;
        let wallet = Arc::new(PostgrestWalletRepo::new(config));
        let platform_account_id =
            Uuid::parse_str(&config.platform_account_id).unwrap_or_else(|_| Uuid::nil());

        Ok(Self {
            repo: Arc::new(PostgrestAppointmentRepo::new(config)),
            gateway: Arc::new(gateway),
            split_engine: PaymentSplitEngine::new(
                wallet,
                BookingPolicy::default(),
                platform_account_id,
            ),
            notifier: Arc::new(TracingNotifier),
            policy: BookingPolicy::default(),
            gateway_key_secret: config.razorpay_key_secret.clone(),
            platform_account_id,
        })
    }

    pub fn with_parts(
        repo: Arc<dyn AppointmentRepo>,
        gateway: Arc<dyn PaymentGateway>,
        split_engine: PaymentSplitEngine,
        notifier: Arc<dyn Notifier>,
        policy: BookingPolicy,
        gateway_key_secret: String,
        platform_account_id: Uuid,
    ) -> Self {
        Self {
            repo,
            gateway,
            split_engine,
            notifier,
            policy,
            gateway_key_secret,
            platform_account_id,
        }
    }

    /// Create (or idempotently re-use) a gateway order for an
    /// appointment, holding the slot under a checkout lock for the
    /// duration of the payment attempt.
    pub async fn create_order(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
        amount: i64,
        currency: &str,
        auth_token: &str,
    ) -> Result<CreateOrderResponse, BookingError> {
        let appointment = self.fetch_owned(patient_id, appointment_id, auth_token).await?;

        if appointment.payment_status == PaymentStatus::Paid {
            return Err(BookingError::AlreadyPaid);
        }
        if appointment.status.is_terminal() {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }
        if amount <= 0 {
            return Err(BookingError::Payment(PaymentError::InvalidAmount(amount)));
        }
        if let Some(fees) = appointment.consultation_fees {
            if fees != amount {
                return Err(BookingError::ValidationError(format!(
                    "Amount {} does not match the recorded fee {}",
                    amount, fees
                )));
            }
        }

        // Conflict check + lock write, one repository call. A lock this
        // appointment already holds is left alone, never re-acquired.
        let now = Utc::now();
        let own_lock_live = appointment
            .checkout_lock_until
            .map_or(false, |until| until > now);
        if !own_lock_live {
            let lock_until = now + Duration::minutes(self.policy.checkout_lock_minutes);
            let outcome = self
                .repo
                .claim_slot_for_checkout(
                    appointment.id,
                    appointment.doctor_id,
                    appointment.appointment_date,
                    appointment.appointment_time,
                    lock_until,
                    now,
                    auth_token,
                )
                .await?;

            if outcome == SlotClaimOutcome::SlotTaken {
                warn!(
                    "Checkout lock denied for appointment {}: slot already held",
                    appointment.id
                );
                return Err(BookingError::SlotTaken);
            }
        }

        let amount_minor = amount * self.policy.minor_unit_multiplier;

        // Idempotent retry: an order already attached to this unpaid
        // appointment is returned as-is.
        if let Some(order_id) = &appointment.gateway_order_id {
            info!(
                "Reusing gateway order {} for appointment {}",
                order_id, appointment.id
            );
            return Ok(CreateOrderResponse {
                key_id: self.gateway.key_id().to_string(),
                order_id: order_id.clone(),
                amount: amount_minor,
                currency: currency.to_string(),
            });
        }

        let order = match self
            .gateway
            .create_order(amount_minor, currency, &appointment.custom_id)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                // A failed gateway call must not leave the slot reserved.
                self.repo.release_lock(appointment.id, auth_token).await?;
                return Err(BookingError::Payment(e));
            }
        };

        self.repo
            .update_fields(
                appointment.id,
                crate::models::AppointmentPatch {
                    gateway_order_id: Some(order.id.clone()),
                    consultation_fees: Some(amount),
                    updated_at: Some(Utc::now()),
                    ..Default::default()
                },
                auth_token,
            )
            .await?;

        info!(
            "Gateway order {} created for appointment {}",
            order.id, appointment.id
        );

        Ok(CreateOrderResponse {
            key_id: self.gateway.key_id().to_string(),
            order_id: order.id,
            amount: amount_minor,
            currency: order.currency,
        })
    }

    /// Verify a completed payment and settle it: signature check, atomic
    /// `pending → paid` flip, and exactly two ledger entries.
    pub async fn verify_payment(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        auth_token: &str,
    ) -> Result<VerifyPaymentResponse, BookingError> {
        let appointment = self.fetch_owned(patient_id, appointment_id, auth_token).await?;

        if appointment.gateway_order_id.as_deref() != Some(order_id) {
            return Err(BookingError::ValidationError(
                "Order does not belong to this appointment".to_string(),
            ));
        }

        if let Err(e) =
            verify_payment_signature(order_id, payment_id, signature, &self.gateway_key_secret)
        {
            // A tampered signature is a security event; the slot is
            // released either way.
            warn!(
                "Payment verification failed for appointment {}: {}",
                appointment.id, e
            );
            self.repo.release_lock(appointment.id, auth_token).await?;
            return Err(BookingError::Payment(e));
        }

        let fees = appointment.consultation_fees.ok_or_else(|| {
            BookingError::DatabaseError("Appointment has no recorded fee".to_string())
        })?;
        let split = self.split_engine.split_fee(fees);

        let transitioned = self
            .repo
            .mark_paid(
                appointment.id,
                payment_id,
                split.doctor_earnings,
                split.admin_commission,
                auth_token,
            )
            .await?;

        if !transitioned {
            // Replay of an already-settled payment: fail fast, never
            // credit the wallets twice.
            return Err(BookingError::AlreadyPaid);
        }

        self.split_engine
            .record_payment_split(
                appointment.id,
                &appointment.custom_id,
                appointment.doctor_id,
                fees,
                auth_token,
            )
            .await?;

        self.notifier.notify(
            appointment.patient_id,
            "payment_received",
            &format!("Payment received for booking {}", appointment.custom_id),
        );
        self.notifier.notify(
            appointment.doctor_id,
            "payment_received",
            &format!("Booking {} has been paid", appointment.custom_id),
        );
        self.notifier.notify(
            self.platform_account_id,
            "payment_received",
            &format!("Commission recorded for booking {}", appointment.custom_id),
        );

        info!(
            "Payment {} verified for appointment {}",
            payment_id, appointment.id
        );

        Ok(VerifyPaymentResponse {
            appointment_id: appointment.id,
            payment_id: payment_id.to_string(),
        })
    }

    /// Manually clear the checkout lock (abandoned checkout). Succeeds
    /// even when no lock is held.
    pub async fn unlock_slot(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let appointment = self.fetch_owned(patient_id, appointment_id, auth_token).await?;
        self.repo.release_lock(appointment.id, auth_token).await
    }

    async fn fetch_owned(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self
            .repo
            .fetch(appointment_id, auth_token)
            .await?
            .ok_or(BookingError::NotFound)?;

        if appointment.patient_id != patient_id {
            return Err(BookingError::Unauthorized);
        }
        Ok(appointment)
    }
}
