use std::env;
use tracing::warn;

pub mod policy;

pub use policy::BookingPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
    /// Wallet owner credited with platform commission entries.
    pub platform_account_id: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID")
                .unwrap_or_else(|_| {
                    warn!("RAZORPAY_KEY_ID not set, using empty value");
                    String::new()
                }),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET")
                .unwrap_or_else(|_| {
                    warn!("RAZORPAY_KEY_SECRET not set, using empty value");
                    String::new()
                }),
            razorpay_base_url: env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            platform_account_id: env::var("PLATFORM_ACCOUNT_ID")
                .unwrap_or_else(|_| {
                    warn!("PLATFORM_ACCOUNT_ID not set, using empty value");
                    String::new()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Payment handlers refuse to run without gateway credentials.
    pub fn is_payments_configured(&self) -> bool {
        !self.razorpay_key_id.is_empty()
            && !self.razorpay_key_secret.is_empty()
            && !self.razorpay_base_url.is_empty()
    }
}
