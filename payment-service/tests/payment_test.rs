//! Payment creation, lookup, verification and fee payments.

mod common;

use common::{payment_body, razorpay_order, TestApp, APP_BASE_URL};
use payment_service::models::{FeePaymentStatus, TransactionStatus};
use payment_service::services::PaymentStore;
use rust_decimal::Decimal;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn create_payment_uses_default_gateway() {
    let app = TestApp::spawn().await;
    let gateway = app.add_gateway("razorpay", true).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(body_partial_json(serde_json::json!({
            "amount": 50000,
            "currency": "INR",
            "receipt": "FEE-2024-001"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(razorpay_order(
            "order_1",
            50000,
            "created",
        )))
        .expect(1)
        .mount(&app.provider)
        .await;

    let response = app
        .post_json("/api/payments", &payment_body("FEE-2024-001", 500))
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction_id"], "order_1");
    assert_eq!(
        body["payment_url"],
        format!("{}/payment/checkout/order_1", APP_BASE_URL)
    );

    let transaction = app.transaction("order_1").await;
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert_eq!(transaction.amount, Decimal::new(500, 0));
    assert_eq!(transaction.order_id, "FEE-2024-001");
    assert_eq!(transaction.gateway_id, gateway.id);
}

#[tokio::test]
async fn create_payment_with_explicit_stripe_gateway() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;
    let stripe = app.add_gateway("stripe", false).await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", "Bearer secret_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_1",
            "payment_status": "unpaid"
        })))
        .expect(1)
        .mount(&app.provider)
        .await;

    let mut body = payment_body("ORD-7", 25);
    body["currency"] = serde_json::json!("usd");
    body["gateway_id"] = serde_json::json!(stripe.id);

    let response = app.post_json("/api/payments", &body).await;

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["transaction_id"], "cs_test_1");
    assert_eq!(body["payment_url"], "https://checkout.stripe.com/c/pay/cs_test_1");

    let transaction = app.transaction("cs_test_1").await;
    assert_eq!(transaction.currency, "USD");
    assert_eq!(transaction.gateway_id, stripe.id);
}

#[tokio::test]
async fn provider_failure_returns_unsuccessful_response() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Authentication failed"
            }
        })))
        .mount(&app.provider)
        .await;

    let response = app
        .post_json("/api/payments", &payment_body("FEE-2024-002", 500))
        .await;

    assert_eq!(response.status().as_u16(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("BAD_REQUEST_ERROR"));
    assert!(body.get("transaction_id").is_none());
}

#[tokio::test]
async fn create_payment_rejects_non_positive_amount() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;

    let response = app
        .post_json("/api/payments", &payment_body("FEE-2024-003", 0))
        .await;

    assert_eq!(response.status().as_u16(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn create_payment_without_default_gateway_fails() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", false).await;

    let response = app
        .post_json("/api/payments", &payment_body("FEE-2024-004", 500))
        .await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NO_DEFAULT_GATEWAY");
}

#[tokio::test]
async fn create_payment_with_unknown_gateway_is_not_found() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;

    let mut body = payment_body("FEE-2024-005", 500);
    body["gateway_id"] = serde_json::json!(uuid::Uuid::new_v4());

    let response = app.post_json("/api/payments", &body).await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn get_unknown_payment_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/payments/order_missing").await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn verify_payment_polls_provider_without_changing_status() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(razorpay_order(
            "order_9",
            50000,
            "created",
        )))
        .mount(&app.provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/order_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(razorpay_order(
            "order_9", 50000, "paid",
        )))
        .expect(1)
        .mount(&app.provider)
        .await;

    app.post_json("/api/payments", &payment_body("FEE-2024-009", 500))
        .await;

    let response = app.get("/api/payments/order_9/verify").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["transaction_id"], "order_9");
    assert_eq!(body["paid"], true);

    // Verification is a read-only poll; settlement comes from webhooks.
    assert_eq!(
        app.transaction("order_9").await.status,
        TransactionStatus::Pending
    );
}

#[tokio::test]
async fn verify_payment_reports_unpaid_when_provider_errors() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(razorpay_order(
            "order_10",
            50000,
            "created",
        )))
        .mount(&app.provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/order_10"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.provider)
        .await;

    app.post_json("/api/payments", &payment_body("FEE-2024-010", 500))
        .await;

    let response = app.get("/api/payments/order_10/verify").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["paid"], false);
}

#[tokio::test]
async fn fee_payment_links_transaction() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(razorpay_order(
            "order_fee_1",
            7500000,
            "created",
        )))
        .mount(&app.provider)
        .await;

    let response = app
        .post_json(
            "/api/fees/payments",
            &serde_json::json!({
                "student_id": "STU-1001",
                "amount": 75000,
                "semester": 3,
                "year": 2024,
                "customer_email": "student@example.edu"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["fee_payment"]["status"], "PENDING");
    assert_eq!(body["fee_payment"]["transaction_id"], "order_fee_1");
    assert_eq!(body["payment"]["success"], true);

    let transaction = app.transaction("order_fee_1").await;
    assert!(transaction.order_id.starts_with("FEE-"));

    let fees = app
        .get("/api/fees/payments?student_id=STU-1001&status=PENDING")
        .await;
    assert_eq!(fees.status().as_u16(), 200);
    let fees: serde_json::Value = fees.json().await.unwrap();
    assert_eq!(fees.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn fee_payment_marked_failed_when_provider_rejects() {
    let app = TestApp::spawn().await;
    app.add_gateway("razorpay", true).await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&app.provider)
        .await;

    let response = app
        .post_json(
            "/api/fees/payments",
            &serde_json::json!({
                "student_id": "STU-1002",
                "amount": 1200,
                "semester": 1,
                "year": 2024,
                "customer_email": "other@example.edu"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["payment"]["success"], false);
    assert_eq!(body["fee_payment"]["status"], "FAILED");

    let stored = app
        .store
        .list_fee_payments(&payment_service::models::FeePaymentFilter {
            student_id: Some("STU-1002".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, FeePaymentStatus::Failed);
    assert!(stored[0].transaction_id.is_none());
}
