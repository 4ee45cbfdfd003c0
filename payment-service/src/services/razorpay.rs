//! Razorpay payment provider client.
//!
//! Orders API for payment initiation, order polling for verification,
//! payment refunds and webhook signature verification.

use crate::dtos::PaymentRequest;
use crate::models::{
    GatewayConfig, PaymentTransaction, Provider, Settlement, SettlementTarget,
};
use crate::services::gateway::{
    to_minor_units, ParsedWebhook, ProviderApi, ProviderCheckout, ProviderRefund,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::utils::signature::{hmac_sha256_hex, sha256_hex, signatures_match};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.razorpay.com/v1";

#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    /// Base of the hosted checkout page (`{base}/payment/checkout/{order_id}`).
    pub checkout_base_url: String,
}

impl RazorpayConfig {
    pub fn from_gateway_config(config: &GatewayConfig, checkout_base_url: &str) -> Self {
        Self {
            key_id: config.api_key.clone(),
            key_secret: Secret::new(config.secret.clone()),
            webhook_secret: Secret::new(config.webhook_secret.clone()),
            api_base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            checkout_base_url: checkout_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Razorpay client for interacting with the Razorpay API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

/// Request to create a Razorpay order.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in paise.
    pub amount: u64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    pub amount: u64,
    #[serde(default)]
    pub amount_paid: u64,
    #[serde(default)]
    pub amount_due: u64,
    pub currency: String,
    pub receipt: Option<String>,
    /// `created`, `attempted` or `paid`.
    pub status: String,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayError {
    pub error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayErrorDetail {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
struct RefundRequest {
    amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayRefund {
    pub id: String,
    pub amount: u64,
    pub status: String,
}

/// Razorpay webhook event.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<WebhookPaymentEntity>,
    pub order: Option<WebhookOrderEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPaymentEntity {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct WebhookOrderEntity {
    pub entity: RazorpayOrder,
}

/// Razorpay payment entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    pub status: String,
    pub order_id: Option<String>,
    pub method: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// Check if Razorpay is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// Create a new order in Razorpay.
    pub async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: Option<String>,
        notes: Option<serde_json::Value>,
    ) -> Result<(RazorpayOrder, serde_json::Value)> {
        if !self.is_configured() {
            return Err(anyhow!("Razorpay credentials not configured"));
        }

        let request = CreateOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt,
            notes,
        };

        let url = format!("{}/orders", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "Razorpay create_order response");

        if status.is_success() {
            let raw: serde_json::Value = serde_json::from_str(&body)?;
            let order: RazorpayOrder = serde_json::from_value(raw.clone())?;
            tracing::info!(
                order_id = %order.id,
                amount = order.amount,
                currency = %order.currency,
                "Razorpay order created"
            );
            Ok((order, raw))
        } else {
            Err(Self::api_error("order creation", &body))
        }
    }

    /// Fetch an existing order by ID.
    pub async fn get_order(&self, order_id: &str) -> Result<RazorpayOrder> {
        if !self.is_configured() {
            return Err(anyhow!("Razorpay credentials not configured"));
        }

        let url = format!("{}/orders/{}", self.config.api_base_url, order_id);

        let response = self
            .client
            .get(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(Self::api_error("order fetch", &body))
        }
    }

    /// Refund part or all of a captured payment.
    pub async fn refund_payment(&self, payment_id: &str, amount: u64) -> Result<RazorpayRefund> {
        let url = format!("{}/payments/{}/refund", self.config.api_base_url, payment_id);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&RefundRequest { amount })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(Self::api_error("refund", &body))
        }
    }

    /// `HMAC-SHA256(body, webhook_secret)`, hex encoded.
    pub fn compute_webhook_signature(&self, body: &[u8]) -> Result<String> {
        hmac_sha256_hex(self.config.webhook_secret.expose_secret(), body)
    }

    fn api_error(operation: &str, body: &str) -> anyhow::Error {
        match serde_json::from_str::<RazorpayError>(body) {
            Ok(error) => {
                tracing::error!(
                    code = %error.error.code,
                    description = %error.error.description,
                    "Razorpay {} failed",
                    operation
                );
                anyhow!(
                    "Razorpay error: {} - {}",
                    error.error.code,
                    error.error.description
                )
            }
            Err(_) => {
                tracing::error!(body = %body, "Razorpay {} failed", operation);
                anyhow!("Razorpay {} failed", operation)
            }
        }
    }
}

#[async_trait]
impl ProviderApi for RazorpayClient {
    fn provider(&self) -> Provider {
        Provider::Razorpay
    }

    async fn create_checkout(&self, request: &PaymentRequest) -> Result<ProviderCheckout> {
        let (order, raw) = self
            .create_order(
                to_minor_units(request.amount)?,
                &request.currency.to_uppercase(),
                Some(request.order_id.clone()),
                Some(serde_json::json!({ "description": request.description })),
            )
            .await?;

        Ok(ProviderCheckout {
            payment_url: format!(
                "{}/payment/checkout/{}",
                self.config.checkout_base_url, order.id
            ),
            transaction_id: order.id,
            raw,
        })
    }

    async fn is_paid(&self, transaction_id: &str) -> Result<bool> {
        Ok(self.get_order(transaction_id).await?.status == "paid")
    }

    fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str) -> bool {
        match self.compute_webhook_signature(raw_payload) {
            Ok(expected) => signatures_match(&expected, signature),
            Err(e) => {
                tracing::error!(error = %e, "Webhook signature computation failed");
                false
            }
        }
    }

    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<ParsedWebhook> {
        let payload: serde_json::Value = serde_json::from_slice(raw_payload)?;
        let event: WebhookEvent = serde_json::from_value(payload.clone())?;

        let payment = event.payload.payment.as_ref().map(|p| &p.entity);
        let payment_json = payload
            .pointer("/payload/payment/entity")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let settlement = match event.event.as_str() {
            "payment.captured" => payment.and_then(|p| {
                p.order_id.clone().map(|order_id| {
                    Settlement::succeeded(
                        SettlementTarget::TransactionId(order_id),
                        Some(p.id.clone()),
                        payment_json.clone(),
                    )
                })
            }),
            "payment.failed" => payment.and_then(|p| {
                p.order_id.clone().map(|order_id| {
                    Settlement::failed(
                        SettlementTarget::TransactionId(order_id),
                        p.error_description.clone(),
                        payment_json.clone(),
                    )
                })
            }),
            "order.paid" => event.payload.order.as_ref().map(|o| {
                Settlement::succeeded(
                    SettlementTarget::TransactionId(o.entity.id.clone()),
                    payment.map(|p| p.id.clone()),
                    payload
                        .pointer("/payload/order/entity")
                        .cloned()
                        .unwrap_or(serde_json::Value::Null),
                )
            }),
            _ => None,
        };

        let transaction_id = payment
            .and_then(|p| p.order_id.clone())
            .or_else(|| event.payload.order.as_ref().map(|o| o.entity.id.clone()));

        Ok(ParsedWebhook {
            // Deliveries carry no stable id in the body; identical bodies are
            // the same delivery.
            event_id: sha256_hex(raw_payload),
            event_type: event.event,
            transaction_id,
            payload,
            settlement,
        })
    }

    async fn refund(
        &self,
        transaction: &PaymentTransaction,
        amount: Decimal,
    ) -> Result<ProviderRefund> {
        let payment_id = transaction
            .provider_payment_id
            .as_deref()
            .ok_or_else(|| anyhow!("No captured payment recorded for this transaction"))?;

        let refund = self
            .refund_payment(payment_id, to_minor_units(amount)?)
            .await?;

        Ok(ProviderRefund {
            refund_id: refund.id,
            status: refund.status,
        })
    }
}
