//! Student fee payments.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreateFeePaymentRequest, FeePaymentResponse, PaymentRequest};
use crate::models::{FeePayment, FeePaymentFilter, FeePaymentStatus, NewFeePayment};
use crate::startup::AppState;

/// Record a pending fee payment and start its payment.
///
/// The fee payment is linked to the provider transaction and completes when
/// that transaction succeeds.
pub async fn create_fee_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreateFeePaymentRequest>,
) -> Result<(StatusCode, Json<FeePaymentResponse>), AppError> {
    payload.validate()?;

    let gateway = state.factory.resolve(payload.gateway_id).await?;

    let mut fee_payment = state
        .store
        .insert_fee_payment(&NewFeePayment {
            student_id: payload.student_id.clone(),
            amount: payload.amount,
            semester: payload.semester,
            year: payload.year,
        })
        .await?;

    let request = PaymentRequest {
        amount: payload.amount,
        currency: payload.currency.clone(),
        order_id: format!("FEE-{}", fee_payment.id.simple()),
        description: format!(
            "Semester {} fee {} for {}",
            payload.semester, payload.year, payload.student_id
        ),
        customer_email: payload.customer_email.clone(),
        customer_name: payload.customer_name.clone(),
        customer_phone: None,
        return_url: payload.return_url.clone(),
        cancel_url: payload.cancel_url.clone(),
    };

    let payment = gateway.create_payment(&request).await?;

    let status = match &payment.transaction_id {
        Some(transaction_id) if payment.success => {
            state
                .store
                .link_fee_payment(fee_payment.id, transaction_id)
                .await?;
            fee_payment.transaction_id = Some(transaction_id.clone());
            StatusCode::CREATED
        }
        _ => {
            state
                .store
                .set_fee_payment_status(fee_payment.id, FeePaymentStatus::Failed)
                .await?;
            fee_payment.status = FeePaymentStatus::Failed;
            StatusCode::BAD_GATEWAY
        }
    };

    tracing::info!(
        fee_payment_id = %fee_payment.id,
        student_id = %fee_payment.student_id,
        transaction_id = ?fee_payment.transaction_id,
        "Fee payment started"
    );

    Ok((
        status,
        Json(FeePaymentResponse {
            fee_payment,
            payment,
        }),
    ))
}

pub async fn list_fee_payments(
    State(state): State<AppState>,
    Query(filter): Query<FeePaymentFilter>,
) -> Result<Json<Vec<FeePayment>>, AppError> {
    Ok(Json(state.store.list_fee_payments(&filter).await?))
}
