use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
    pub platform_account_id: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            razorpay_key_id: "rzp_test_key".to_string(),
            razorpay_key_secret: "rzp_test_secret".to_string(),
            razorpay_base_url: "http://localhost:54322".to_string(),
            platform_account_id: Uuid::new_v4().to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            razorpay_key_id: self.razorpay_key_id.clone(),
            razorpay_key_secret: self.razorpay_key_secret.clone(),
            razorpay_base_url: self.razorpay_base_url.clone(),
            platform_account_id: self.platform_account_id.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct GatewayTestUtils;

impl GatewayTestUtils {
    /// Signature the gateway would attach to a successful payment:
    /// hex-encoded HMAC-SHA256 over `order_id|payment_id`.
    pub fn sign_payment(order_id: &str, payment_id: &str, secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn schedule_response(doctor_id: &str) -> serde_json::Value {
        json!({
            "doctor_id": doctor_id,
            "weekly_schedule": {
                "monday": [
                    {"start_time": "09:00", "end_time": "11:00", "max_patients_per_slot": 1}
                ]
            },
            "default_slot_duration_minutes": 30,
            "buffer_minutes": 5,
            "blocked_dates": [],
            "recurring_exceptions": [],
            "is_active": true,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(appointment_id: &str, patient_id: &str, doctor_id: &str) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "custom_id": "APT-20260101-TEST01",
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_date": "2026-01-05",
            "appointment_time": "09:00-09:30",
            "appointment_type": "video",
            "status": "pending",
            "payment_status": "pending",
            "checkout_lock_until": null,
            "gateway_order_id": null,
            "payment_id": null,
            "consultation_fees": 1000,
            "doctor_earnings": null,
            "admin_commission": null,
            "reschedule_count": 0,
            "cancellation_reason": null,
            "rejection_reason": null,
            "notes": null,
            "chat_enabled": false,
            "consultation_started_at": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn gateway_order_response(order_id: &str, amount_minor: i64) -> serde_json::Value {
        json!({
            "id": order_id,
            "entity": "order",
            "amount": amount_minor,
            "currency": "INR",
            "receipt": "APT-20260101-TEST01",
            "status": "created"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert!(app_config.is_payments_configured());
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert!(user_model.is_doctor());
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_payment_signature_is_hex() {
        let sig = GatewayTestUtils::sign_payment("order_1", "pay_1", "secret");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
