use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use super::subject_index;
use crate::models::MarkFilter;
use crate::services::grading::{self, PerformanceReport};
use crate::startup::AppState;

/// Grade distribution and per-subject averages over the filtered marks.
pub async fn performance(
    State(state): State<AppState>,
    Query(filter): Query<MarkFilter>,
) -> Result<Json<PerformanceReport>, AppError> {
    let marks = state.store.list_marks(&filter).await?;
    let subjects = subject_index(&state).await?;

    Ok(Json(grading::performance_report(&marks, &subjects)))
}
