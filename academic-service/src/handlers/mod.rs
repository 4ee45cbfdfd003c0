//! HTTP handlers for academic-service.

pub mod analytics;
pub mod attendance;
pub mod marks;
pub mod students;
pub mod subjects;
pub mod timetable;

use crate::models::Subject;
use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;
use std::collections::HashMap;
use uuid::Uuid;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "academic-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness probe: the store must answer.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// All subjects keyed by id, for credit and name lookups.
pub(crate) async fn subject_index(state: &AppState) -> Result<HashMap<Uuid, Subject>, AppError> {
    Ok(state
        .store
        .list_subjects()
        .await?
        .into_iter()
        .map(|subject| (subject.id, subject))
        .collect())
}

pub(crate) async fn require_subject(state: &AppState, subject_id: Uuid) -> Result<Subject, AppError> {
    state
        .store
        .get_subject(subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subject {} not found", subject_id)))
}
