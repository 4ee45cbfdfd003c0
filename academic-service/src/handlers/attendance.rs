use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use validator::Validate;

use super::require_subject;
use crate::dtos::{AttendanceRecordedResponse, RecordAttendanceRequest};
use crate::startup::AppState;

/// Record one class session. Re-recording a student for the same subject and
/// date replaces the earlier status.
pub async fn record_attendance(
    State(state): State<AppState>,
    Json(payload): Json<RecordAttendanceRequest>,
) -> Result<(StatusCode, Json<AttendanceRecordedResponse>), AppError> {
    payload.validate()?;
    require_subject(&state, payload.subject_id).await?;

    let records = state.store.record_attendance(&payload.records()).await?;
    tracing::info!(
        subject_id = %payload.subject_id,
        date = %payload.date,
        rows = records.len(),
        "Attendance recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(AttendanceRecordedResponse {
            recorded: records.len(),
            records,
        }),
    ))
}
