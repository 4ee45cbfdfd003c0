//! Payment creation, lookup, verification and refunds.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreatePaymentRequest, PaymentResponse, RefundRequest, RefundResponse, VerifyResponse};
use crate::models::PaymentTransaction;
use crate::startup::AppState;

/// Start a payment through the requested or default gateway.
///
/// Provider failures are reported as `{success: false, error}` with 502.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    tracing::info!(
        order_id = %payload.payment.order_id,
        amount = %payload.payment.amount,
        gateway_id = ?payload.gateway_id,
        "Creating payment"
    );

    let gateway = state.factory.resolve(payload.gateway_id).await?;
    let response = gateway.create_payment(&payload.payment).await?;

    let status = if response.success {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(response)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentTransaction>, AppError> {
    let transaction = state
        .store
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    Ok(Json(transaction))
}

/// Ask the provider whether the payment went through. Never mutates state.
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<VerifyResponse>, AppError> {
    let transaction = state
        .store
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    let gateway = state.factory.create_gateway(transaction.gateway_id).await?;
    let paid = gateway.verify_payment(&transaction_id).await;

    Ok(Json(VerifyResponse {
        transaction_id,
        paid,
    }))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Json(payload): Json<RefundRequest>,
) -> Result<(StatusCode, Json<RefundResponse>), AppError> {
    payload.validate()?;

    let transaction = state
        .store
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    tracing::info!(
        transaction_id = %transaction_id,
        amount = %payload.amount,
        "Refund requested"
    );

    let gateway = state.factory.create_gateway(transaction.gateway_id).await?;
    let response = gateway
        .refund_payment(&transaction_id, payload.amount)
        .await?;

    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(response)))
}
