//! Stripe payment provider client.
//!
//! Checkout Sessions for payment initiation, session polling for
//! verification, refunds against the session's payment intent and
//! `Stripe-Signature` webhook verification.

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
use serde::Deserialize;
use service_core::utils::signature::{hmac_sha256_hex, signatures_match};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Maximum accepted age of a signed webhook, in seconds.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    /// Used when a request carries no return/cancel URL.
    pub app_base_url: String,
    pub webhook_tolerance_secs: i64,
}

impl StripeConfig {
    pub fn from_gateway_config(
        config: &GatewayConfig,
        app_base_url: &str,
        webhook_tolerance_secs: i64,
    ) -> Self {
        Self {
            secret_key: Secret::new(config.secret.clone()),
            webhook_secret: Secret::new(config.webhook_secret.clone()),
            api_base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
            webhook_tolerance_secs,
        }
    }
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`.
#[derive(Debug, PartialEq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Option<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) if !value.is_empty() => signatures.push(value.to_string()),
                _ => {}
            }
        }

        match (timestamp, signatures.is_empty()) {
            (Some(timestamp), false) => Some(Self {
                timestamp,
                signatures,
            }),
            _ => None,
        }
    }
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    pub async fn create_checkout_session(
        &self,
        request: &PaymentRequest,
    ) -> Result<(CheckoutSession, serde_json::Value)> {
        let unit_amount = to_minor_units(request.amount)?.to_string();
        let success_url = request.return_url.clone().unwrap_or_else(|| {
            format!(
                "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.config.app_base_url
            )
        });
        let cancel_url = request
            .cancel_url
            .clone()
            .unwrap_or_else(|| format!("{}/payment/cancel", self.config.app_base_url));

        let form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            (
                "line_items[0][price_data][currency]",
                request.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.clone(),
            ),
            ("line_items[0][price_data][unit_amount]", unit_amount),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("customer_email", request.customer_email.clone()),
            ("metadata[order_id]", request.order_id.clone()),
            // Lets payment_intent.* events be traced back to the order.
            (
                "payment_intent_data[metadata][order_id]",
                request.order_id.clone(),
            ),
        ];

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base_url))
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let raw: serde_json::Value = serde_json::from_str(&body)?;
            let session: CheckoutSession = serde_json::from_value(raw.clone())?;
            tracing::info!(session_id = %session.id, "Stripe checkout session created");
            Ok((session, raw))
        } else {
            Err(Self::api_error("checkout session creation", &body))
        }
    }

    pub async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.config.api_base_url, session_id
            ))
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(Self::api_error("checkout session fetch", &body))
        }
    }

    pub async fn create_refund(&self, payment_intent: &str, amount: u64) -> Result<StripeRefund> {
        let response = self
            .client
            .post(format!("{}/v1/refunds", self.config.api_base_url))
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&[
                ("payment_intent", payment_intent.to_string()),
                ("amount", amount.to_string()),
            ])
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

    /// Expected `v1` signature for `timestamp` and `body`.
    pub fn compute_signature(&self, timestamp: i64, body: &[u8]) -> Result<String> {
        let mut signed = format!("{}.", timestamp).into_bytes();
        signed.extend_from_slice(body);
        hmac_sha256_hex(self.config.webhook_secret.expose_secret(), &signed)
    }

    /// Verify a `Stripe-Signature` header as of `now` (unix seconds).
    pub fn verify_signature_at(&self, body: &[u8], header: &str, now: i64) -> bool {
        let Some(header) = SignatureHeader::parse(header) else {
            tracing::warn!("Malformed Stripe-Signature header");
            return false;
        };

        if (now - header.timestamp).abs() > self.config.webhook_tolerance_secs {
            tracing::warn!(timestamp = header.timestamp, "Stripe webhook outside tolerance");
            return false;
        }

        match self.compute_signature(header.timestamp, body) {
            Ok(expected) => header
                .signatures
                .iter()
                .any(|candidate| signatures_match(&expected, candidate)),
            Err(e) => {
                tracing::error!(error = %e, "Webhook signature computation failed");
                false
            }
        }
    }

    fn api_error(operation: &str, body: &str) -> anyhow::Error {
        let detail = serde_json::from_str::<StripeErrorBody>(body)
            .ok()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.error.kind.unwrap_or_else(|| "api_error".to_string()),
                    e.error.message.unwrap_or_default()
                )
            });
        tracing::error!(detail = ?detail, "Stripe {} failed", operation);
        match detail {
            Some(detail) => anyhow!("Stripe error: {}", detail),
            None => anyhow!("Stripe {} failed", operation),
        }
    }
}

fn string_at(value: &serde_json::Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl ProviderApi for StripeClient {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    async fn create_checkout(&self, request: &PaymentRequest) -> Result<ProviderCheckout> {
        let (session, raw) = self.create_checkout_session(request).await?;
        let payment_url = session
            .url
            .ok_or_else(|| anyhow!("Stripe checkout session has no URL"))?;

        Ok(ProviderCheckout {
            transaction_id: session.id,
            payment_url,
            raw,
        })
    }

    async fn is_paid(&self, transaction_id: &str) -> Result<bool> {
        let session = self.get_checkout_session(transaction_id).await?;
        Ok(session.payment_status.as_deref() == Some("paid"))
    }

    fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str) -> bool {
        self.verify_signature_at(raw_payload, signature, chrono::Utc::now().timestamp())
    }

    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<ParsedWebhook> {
        let payload: serde_json::Value = serde_json::from_slice(raw_payload)?;
        let event: StripeEvent = serde_json::from_value(payload.clone())?;
        let object = &event.data.object;

        let session_id = || string_at(object, "/id").map(SettlementTarget::TransactionId);

        let settlement = match event.event_type.as_str() {
            "checkout.session.completed" => {
                // Delayed payment methods complete the session unpaid.
                let paid = string_at(object, "/payment_status")
                    .map_or(true, |status| status == "paid" || status == "no_payment_required");
                if paid {
                    session_id().map(|target| {
                        Settlement::succeeded(
                            target,
                            string_at(object, "/payment_intent"),
                            object.clone(),
                        )
                    })
                } else {
                    None
                }
            }
            "checkout.session.async_payment_succeeded" => session_id().map(|target| {
                Settlement::succeeded(target, string_at(object, "/payment_intent"), object.clone())
            }),
            "checkout.session.async_payment_failed" | "checkout.session.expired" => {
                session_id().map(|target| {
                    Settlement::failed(target, Some(event.event_type.clone()), object.clone())
                })
            }
            "payment_intent.payment_failed" => string_at(object, "/metadata/order_id").map(|order_id| {
                Settlement::failed(
                    SettlementTarget::OrderId(order_id),
                    string_at(object, "/last_payment_error/message"),
                    object.clone(),
                )
            }),
            _ => None,
        };

        let transaction_id = match &settlement {
            Some(Settlement {
                target: SettlementTarget::TransactionId(id),
                ..
            }) => Some(id.clone()),
            _ => None,
        };

        Ok(ParsedWebhook {
            event_id: event.id,
            event_type: event.event_type,
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
        let payment_intent = match &transaction.provider_payment_id {
            Some(intent) => intent.clone(),
            None => self
                .get_checkout_session(&transaction.transaction_id)
                .await?
                .payment_intent
                .ok_or_else(|| anyhow!("Checkout session has no payment intent"))?,
        };

        let refund = self
            .create_refund(&payment_intent, to_minor_units(amount)?)
            .await?;

        if refund.status == "failed" || refund.status == "canceled" {
            return Err(anyhow!("Stripe refund {} {}", refund.id, refund.status));
        }

        Ok(ProviderRefund {
            refund_id: refund.id,
            status: refund.status,
        })
    }
}
