//! Provider webhook endpoint.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use service_core::error::AppError;

use crate::dtos::WebhookAck;
use crate::models::Provider;
use crate::startup::AppState;

/// Receive a provider webhook.
///
/// The signature is checked over the exact request bytes; any mismatch is
/// rejected before anything is recorded. A provider with no active gateway
/// is a 400, like any other delivery that cannot be processed.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let provider = Provider::parse(&provider)?;

    let signature = headers
        .get(provider.signature_header())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!(provider = %provider, "Missing webhook signature header");
            AppError::InvalidSignature
        })?;

    let gateway = match state.factory.gateway_for_provider(provider).await {
        Ok(gateway) => gateway,
        Err(AppError::NotFound(e)) => {
            tracing::warn!(provider = %provider, "Webhook for provider without an active gateway");
            return Err(AppError::BadRequest(e));
        }
        Err(e) => return Err(e),
    };
    let outcome = gateway.process_webhook(&body, signature).await?;

    Ok(Json(WebhookAck {
        received: true,
        duplicate: outcome.duplicate,
    }))
}
