//! Probes, metrics and shared middleware.

mod common;

use common::{slot, TestApp};

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "academic-service");
}

#[tokio::test]
async fn readiness_reports_ready_with_reachable_store() {
    let app = TestApp::spawn().await;

    let response = app.get("/ready").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn metrics_endpoint_exposes_conflict_counter() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;
    app.schedule(&slot(&subject, "F1", None, "MONDAY", "09:00", "10:00"))
        .await;
    app.schedule(&slot(&subject, "F1", None, "MONDAY", "09:30", "10:30"))
        .await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("academic_timetable_conflicts_total"));
}

#[tokio::test]
async fn responses_carry_security_headers_and_request_id() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn api_routes_are_rate_limited_per_route() {
    let app = TestApp::spawn_with_rate_limit(2).await;

    for _ in 0..2 {
        let response = app.get("/api/timetable").await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = app.get("/api/timetable").await;
    assert_eq!(response.status().as_u16(), 429);
    assert!(response.headers().contains_key("retry-after"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "RATE_LIMITED");

    // Probes and other routes keep their own budget.
    assert_eq!(app.get("/health").await.status().as_u16(), 200);
    assert_eq!(app.get("/api/subjects").await.status().as_u16(), 200);
}
