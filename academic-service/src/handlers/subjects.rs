use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::CreateSubjectRequest;
use crate::models::Subject;
use crate::startup::AppState;

pub async fn create_subject(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    payload.validate()?;

    let subject = state.store.insert_subject(&payload.into()).await?;
    tracing::info!(subject_id = %subject.id, code = %subject.code, "Subject created");

    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn list_subjects(State(state): State<AppState>) -> Result<Json<Vec<Subject>>, AppError> {
    Ok(Json(state.store.list_subjects().await?))
}
