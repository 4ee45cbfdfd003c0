//! Common test utilities for academic-service integration tests.

#![allow(dead_code)]

use academic_service::config::{AcademicConfig, AcademicSettings, DatabaseConfig};
use academic_service::services::InMemoryAcademicStore;
use academic_service::startup::Application;
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::{Config as CommonConfig, RateLimitSettings};
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        service_core::observability::init_test_tracing("info,academic_service=debug");
    });
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<InMemoryAcademicStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(1000, AcademicSettings::default()).await
    }

    pub async fn spawn_with_rate_limit(requests: u32) -> Self {
        Self::spawn_with(requests, AcademicSettings::default()).await
    }

    pub async fn spawn_with(requests: u32, settings: AcademicSettings) -> Self {
        init_tracing();

        let config = AcademicConfig {
            common: CommonConfig {
                port: 0,
                rate_limit: RateLimitSettings {
                    requests,
                    window_seconds: 60,
                    sweep_interval_seconds: 300,
                },
            },
            service_name: "academic-service-test".to_string(),
            service_version: "test".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: Secret::new("postgres://unused".to_string()),
                max_connections: 1,
                min_connections: 1,
            },
            settings,
        };

        let store = Arc::new(InMemoryAcademicStore::new());
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
            client: reqwest::Client::new(),
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a subject and return its id.
    pub async fn add_subject(&self, code: &str, credits: i32) -> String {
        let response = self
            .post_json(
                "/api/subjects",
                &json!({
                    "code": code,
                    "name": format!("{} lectures", code),
                    "credits": credits,
                    "semester": 3,
                    "year": 2024
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "subject {} not created", code);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn schedule(&self, body: &Value) -> reqwest::Response {
        self.post_json("/api/timetable", body).await
    }

    pub async fn record_mark(
        &self,
        student_id: &str,
        subject_id: &str,
        obtained: f64,
        max: f64,
    ) -> reqwest::Response {
        self.post_json("/api/marks", &mark(student_id, subject_id, obtained, max))
            .await
    }
}

/// Timetable entry body for semester 3, 2024.
pub fn slot(
    subject_id: &str,
    faculty_id: &str,
    room_id: Option<&str>,
    day: &str,
    start: &str,
    end: &str,
) -> Value {
    json!({
        "subject_id": subject_id,
        "faculty_id": faculty_id,
        "room_id": room_id,
        "day_of_week": day,
        "start_time": start,
        "end_time": end,
        "semester": 3,
        "year": 2024
    })
}

pub fn mark(student_id: &str, subject_id: &str, obtained: f64, max: f64) -> Value {
    json!({
        "student_id": student_id,
        "subject_id": subject_id,
        "faculty_id": "F1",
        "exam_type": "FINAL",
        "max_marks": max,
        "obtained_marks": obtained,
        "semester": 3,
        "year": 2024
    })
}
