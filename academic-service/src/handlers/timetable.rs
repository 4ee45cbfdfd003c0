//! Timetable listing, conflict-checked creation and removal.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{ConflictCheckResponse, CreateTimetableEntryRequest, TimetableQuery};
use crate::models::TimetableEntry;
use crate::startup::AppState;

/// Entries matching the query, ordered by day then start time.
pub async fn list_timetable(
    State(state): State<AppState>,
    Query(query): Query<TimetableQuery>,
) -> Result<Json<Vec<TimetableEntry>>, AppError> {
    let filter = query.into_filter()?;
    Ok(Json(state.store.list_timetable(&filter).await?))
}

/// Create an entry. Overlaps for the faculty or the room fail with 409
/// `SCHEDULE_CONFLICT` and the clashing entries in `details`.
pub async fn create_timetable_entry(
    State(state): State<AppState>,
    Json(payload): Json<CreateTimetableEntryRequest>,
) -> Result<(StatusCode, Json<TimetableEntry>), AppError> {
    payload.validate()?;
    let proposed = payload.into_new_entry()?;

    let entry = state.scheduler.create(&proposed).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Dry run of [`create_timetable_entry`]: report clashes, write nothing.
pub async fn check_timetable_entry(
    State(state): State<AppState>,
    Json(payload): Json<CreateTimetableEntryRequest>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    payload.validate()?;
    let proposed = payload.into_new_entry()?;

    let report = state.scheduler.check(&proposed).await?;
    Ok(Json(report.into()))
}

pub async fn delete_timetable_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_timetable_entry(id).await? {
        tracing::info!(entry_id = %id, "Timetable entry deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Timetable entry {} not found",
            id
        )))
    }
}
