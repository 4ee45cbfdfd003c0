//! Per-student views: transcript and attendance summary.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use super::subject_index;
use crate::models::MarkFilter;
use crate::services::attendance::{self, AttendanceSummary};
use crate::services::grading::{self, Transcript};
use crate::startup::AppState;

/// Per-semester GPA and the credit-weighted overall GPA.
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Transcript>, AppError> {
    let marks = state
        .store
        .list_marks(&MarkFilter::for_student(&student_id))
        .await?;
    let subjects = subject_index(&state).await?;

    Ok(Json(grading::transcript(&student_id, &marks, &subjects)))
}

/// Attendance per subject and overall, flagged against the 75% requirement.
pub async fn get_attendance(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<AttendanceSummary>, AppError> {
    let records = state.store.list_attendance(&student_id).await?;
    let subjects = subject_index(&state).await?;

    Ok(Json(attendance::summarize(&student_id, &records, &subjects)))
}
