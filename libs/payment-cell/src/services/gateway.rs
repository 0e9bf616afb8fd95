// libs/payment-cell/src/services/gateway.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{GatewayOrder, GatewayOrderRequest, PaymentError};

/// Order-creation surface of the payment gateway. The engine only ever
/// creates orders and verifies signatures; everything else is the
/// gateway's business.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` is in minor units (paise).
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError>;

    /// Public key id handed to the client for the checkout widget.
    fn key_id(&self) -> &str;
}

/// Razorpay Orders API client.
/// Based on: https://razorpay.com/docs/api/orders/
#[derive(Debug)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payments_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            base_url: config.razorpay_base_url.clone(),
        })
    }

    fn basic_auth_header(&self) -> String {
        let credentials = STANDARD.encode(format!("{}:{}", self.key_id, self.key_secret));
        format!("Basic {}", credentials)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        info!("Creating gateway order for receipt {}", receipt);

        let url = format!("{}/orders", self.base_url);

        let request_body = GatewayOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        };

        debug!("Sending order creation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.basic_auth_header())
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        debug!("Gateway order creation response: {} - {}", status, response_text);

        if !status.is_success() {
            error!("Gateway order creation failed: {} - {}", status, response_text);
            return Err(PaymentError::Gateway(format!(
                "HTTP {}: {}",
                status, response_text
            )));
        }

        let order: GatewayOrder = serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::Gateway(format!("Failed to parse order response: {}", e)))?;

        info!("Successfully created gateway order: {}", order.id);
        Ok(order)
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}
