//! Common test utilities for payment-service integration tests.

#![allow(dead_code)]

use payment_service::config::{DatabaseConfig, PaymentConfig};
use payment_service::models::{PaymentGatewayRecord, PaymentTransaction};
use payment_service::services::{GatewaySettings, InMemoryPaymentStore, PaymentStore};
use payment_service::startup::Application;
use secrecy::Secret;
use service_core::config::{Config as CommonConfig, RateLimitSettings};
use service_core::utils::signature::hmac_sha256_hex;
use std::sync::{Arc, Once};
use uuid::Uuid;
use wiremock::MockServer;

pub const WEBHOOK_SECRET: &str = "test_webhook_secret";
pub const APP_BASE_URL: &str = "https://campus.example.edu";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        service_core::observability::init_test_tracing("info,payment_service=debug");
    });
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<InMemoryPaymentStore>,
    /// Stands in for the Razorpay and Stripe APIs.
    pub provider: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_rate_limit(1000).await
    }

    pub async fn spawn_with_rate_limit(requests: u32) -> Self {
        init_tracing();

        let config = PaymentConfig {
            common: CommonConfig {
                port: 0,
                rate_limit: RateLimitSettings {
                    requests,
                    window_seconds: 60,
                    sweep_interval_seconds: 300,
                },
            },
            service_name: "payment-service-test".to_string(),
            service_version: "test".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: Secret::new("postgres://unused".to_string()),
                max_connections: 1,
                min_connections: 1,
            },
            gateways: GatewaySettings {
                app_base_url: APP_BASE_URL.to_string(),
                webhook_tolerance_secs: 300,
            },
        };

        let store = Arc::new(InMemoryPaymentStore::new());
        let app = Application::build_with_store(config, store.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Self {
            address: format!("http://127.0.0.1:{}", port),
            port,
            store,
            provider: MockServer::start().await,
            client: reqwest::Client::new(),
        }
    }

    /// Register an active gateway pointing at the mock provider.
    pub async fn add_gateway(&self, provider: &str, is_default: bool) -> PaymentGatewayRecord {
        let api_base_url = match provider {
            "razorpay" => format!("{}/v1", self.provider.uri()),
            _ => self.provider.uri(),
        };

        let record = PaymentGatewayRecord {
            id: Uuid::new_v4(),
            name: format!("{} (test)", provider),
            provider: provider.to_string(),
            config: serde_json::json!({
                "api_key": "key_test",
                "secret": "secret_test",
                "webhook_secret": WEBHOOK_SECRET,
                "mode": "test",
                "api_base_url": api_base_url,
            }),
            is_active: true,
            is_default,
        };
        self.store
            .upsert_gateway(&record)
            .await
            .expect("Failed to add gateway");
        record
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Deliver a webhook body exactly as given.
    pub async fn post_webhook(
        &self,
        provider: &str,
        body: &str,
        signature_header: (&str, String),
    ) -> reqwest::Response {
        self.client
            .post(format!("{}/api/payments/webhook/{}", self.address, provider))
            .header("content-type", "application/json")
            .header(signature_header.0, signature_header.1)
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Deliver a correctly signed Razorpay `payment.captured` for `order_id`.
    pub async fn capture_razorpay(&self, order_id: &str, payment_id: &str) -> reqwest::Response {
        let body = razorpay_captured(order_id, payment_id);
        self.post_webhook(
            "razorpay",
            &body,
            ("x-razorpay-signature", razorpay_signature(&body)),
        )
        .await
    }

    pub async fn transaction(&self, transaction_id: &str) -> PaymentTransaction {
        self.store
            .get_transaction(transaction_id)
            .await
            .expect("Store error")
            .expect("Transaction not found")
    }
}

pub fn razorpay_signature(body: &str) -> String {
    hmac_sha256_hex(WEBHOOK_SECRET, body.as_bytes()).unwrap()
}

pub fn stripe_signature(body: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let signed = format!("{}.{}", timestamp, body);
    format!(
        "t={},v1={}",
        timestamp,
        hmac_sha256_hex(WEBHOOK_SECRET, signed.as_bytes()).unwrap()
    )
}

pub fn razorpay_order(order_id: &str, amount_paise: u64, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": order_id,
        "entity": "order",
        "amount": amount_paise,
        "amount_paid": 0,
        "amount_due": amount_paise,
        "currency": "INR",
        "receipt": "receipt",
        "status": status,
        "attempts": 0,
        "notes": [],
        "created_at": 1_700_000_000u64
    })
}

pub fn razorpay_captured(order_id: &str, payment_id: &str) -> String {
    serde_json::json!({
        "entity": "event",
        "account_id": "acc_test",
        "event": "payment.captured",
        "contains": ["payment"],
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "entity": "payment",
                    "amount": 50000,
                    "currency": "INR",
                    "status": "captured",
                    "order_id": order_id,
                    "method": "upi",
                    "captured": true
                }
            }
        },
        "created_at": 1_700_000_100u64
    })
    .to_string()
}

pub fn payment_body(order_id: &str, amount: u32) -> serde_json::Value {
    serde_json::json!({
        "amount": amount,
        "currency": "INR",
        "order_id": order_id,
        "description": "Semester 3 tuition",
        "customer_email": "student@example.edu",
        "customer_name": "Test Student"
    })
}
