//! Mark entry and listing.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::require_subject;
use crate::dtos::{BatchMarksRequest, BatchMarksResponse, CreateMarkRequest, MarkResult};
use crate::models::{GradedMark, MarkFilter, NewMark};
use crate::services::{grading, metrics};
use crate::startup::AppState;

async fn record_mark(state: &AppState, payload: CreateMarkRequest) -> Result<GradedMark, AppError> {
    payload.validate()?;
    let mark = NewMark::from(payload);
    mark.check_bounds()?;

    let stored = state.store.insert_mark(&mark).await?;
    Ok(grading::grade_mark(stored))
}

/// Record one mark and return it graded.
pub async fn create_mark(
    State(state): State<AppState>,
    Json(payload): Json<CreateMarkRequest>,
) -> Result<(StatusCode, Json<GradedMark>), AppError> {
    require_subject(&state, payload.subject_id).await?;

    match record_mark(&state, payload).await {
        Ok(graded) => {
            metrics::record_mark("recorded");
            tracing::info!(
                mark_id = %graded.mark.id,
                student_id = %graded.mark.student_id,
                grade = %graded.grade,
                "Mark recorded"
            );
            Ok((StatusCode::CREATED, Json(graded)))
        }
        Err(e) => {
            metrics::record_mark("rejected");
            Err(e)
        }
    }
}

/// Record many marks. Each row succeeds or fails on its own; the response
/// lists one result per input row in order.
pub async fn create_marks_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchMarksRequest>,
) -> Result<Json<BatchMarksResponse>, AppError> {
    payload.validate()?;
    if payload.marks.len() > state.settings.max_mark_batch {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At most {} marks per batch",
            state.settings.max_mark_batch
        )));
    }

    let mut known_subjects: HashMap<Uuid, bool> = HashMap::new();
    let mut results = Vec::with_capacity(payload.marks.len());

    for (index, row) in payload.marks.into_iter().enumerate() {
        let subject_exists = match known_subjects.get(&row.subject_id) {
            Some(exists) => *exists,
            None => {
                let exists = state.store.get_subject(row.subject_id).await?.is_some();
                known_subjects.insert(row.subject_id, exists);
                exists
            }
        };

        let outcome = if subject_exists {
            record_mark(&state, row).await
        } else {
            Err(AppError::NotFound(anyhow::anyhow!(
                "Subject {} not found",
                row.subject_id
            )))
        };

        results.push(match outcome {
            Ok(graded) => {
                metrics::record_mark("recorded");
                MarkResult {
                    index,
                    success: true,
                    mark: Some(graded),
                    error: None,
                }
            }
            // Storage failures abort the batch; row errors are reported.
            Err(e @ AppError::DatabaseError(_)) => return Err(e),
            Err(e) => {
                metrics::record_mark("rejected");
                MarkResult {
                    index,
                    success: false,
                    mark: None,
                    error: Some(e.to_string()),
                }
            }
        });
    }

    let recorded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - recorded;
    tracing::info!(recorded = recorded, failed = failed, "Mark batch processed");

    Ok(Json(BatchMarksResponse {
        recorded,
        failed,
        results,
    }))
}

/// Marks matching the filter, newest first, with percentage and grade.
pub async fn list_marks(
    State(state): State<AppState>,
    Query(filter): Query<MarkFilter>,
) -> Result<Json<Vec<GradedMark>>, AppError> {
    let marks = state.store.list_marks(&filter).await?;
    Ok(Json(marks.into_iter().map(grading::grade_mark).collect()))
}
