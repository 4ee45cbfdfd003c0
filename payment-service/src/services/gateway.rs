//! Payment gateway abstraction.
//!
//! [`PaymentGateway`] is the provider-independent surface used by handlers.
//! Each provider implements the wire-level [`ProviderApi`]; [`Gateway`] layers
//! validation, persistence, the transaction state machine and webhook
//! idempotency on top of it.

use crate::dtos::{PaymentRequest, PaymentResponse, RefundResponse};
use crate::models::{
    NewTransaction, NewWebhookEvent, PaymentTransaction, Provider, Settlement, TransactionStatus,
    WebhookOutcome,
};
use crate::services::metrics;
use crate::services::store::PaymentStore;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::utils::KeyedLocks;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// A checkout created at the provider.
#[derive(Debug, Clone)]
pub struct ProviderCheckout {
    pub transaction_id: String,
    pub payment_url: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ProviderRefund {
    pub refund_id: String,
    pub status: String,
}

/// A webhook body after signature verification and parsing.
#[derive(Debug, Clone)]
pub struct ParsedWebhook {
    pub event_id: String,
    pub event_type: String,
    pub transaction_id: Option<String>,
    pub payload: serde_json::Value,
    pub settlement: Option<Settlement>,
}

/// Wire-level operations of one payment provider.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    fn provider(&self) -> Provider;

    async fn create_checkout(&self, request: &PaymentRequest) -> anyhow::Result<ProviderCheckout>;

    /// Whether the provider reports the checkout as paid.
    async fn is_paid(&self, transaction_id: &str) -> anyhow::Result<bool>;

    /// Check `signature` against the exact bytes received.
    fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str) -> bool;

    fn parse_webhook(&self, raw_payload: &[u8]) -> anyhow::Result<ParsedWebhook>;

    async fn refund(
        &self,
        transaction: &PaymentTransaction,
        amount: Decimal,
    ) -> anyhow::Result<ProviderRefund>;
}

/// Provider-independent payment operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn gateway_id(&self) -> Uuid;

    fn provider(&self) -> Provider;

    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError>;

    /// Read-only provider poll. Errors are logged and reported as unpaid.
    async fn verify_payment(&self, transaction_id: &str) -> bool;

    async fn process_webhook(
        &self,
        raw_payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, AppError>;

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<RefundResponse, AppError>;
}

/// Amount in the provider's minor unit (paise, cents).
pub fn to_minor_units(amount: Decimal) -> anyhow::Result<u64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_u64()
        .ok_or_else(|| anyhow::anyhow!("Amount {} cannot be expressed in minor units", amount))
}

pub struct Gateway<P> {
    gateway_id: Uuid,
    api: P,
    store: Arc<dyn PaymentStore>,
    locks: KeyedLocks,
}

impl<P: ProviderApi> Gateway<P> {
    pub fn new(gateway_id: Uuid, api: P, store: Arc<dyn PaymentStore>, locks: KeyedLocks) -> Self {
        Self {
            gateway_id,
            api,
            store,
            locks,
        }
    }

    pub fn api(&self) -> &P {
        &self.api
    }
}

#[async_trait]
impl<P: ProviderApi> PaymentGateway for Gateway<P> {
    fn gateway_id(&self) -> Uuid {
        self.gateway_id
    }

    fn provider(&self) -> Provider {
        self.api.provider()
    }

    #[tracing::instrument(skip(self, request), fields(gateway_id = %self.gateway_id, provider = %self.api.provider(), order_id = %request.order_id))]
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse, AppError> {
        request.validate()?;

        let checkout = match self.api.create_checkout(request).await {
            Ok(checkout) => checkout,
            Err(e) => {
                tracing::error!(error = %e, "Payment creation failed at provider");
                metrics::record_payment(self.api.provider().as_str(), "provider_error");
                return Ok(PaymentResponse::failed(e.to_string()));
            }
        };

        let transaction = self
            .store
            .insert_transaction(&NewTransaction {
                transaction_id: checkout.transaction_id.clone(),
                order_id: request.order_id.clone(),
                amount: request.amount,
                currency: request.currency.to_uppercase(),
                gateway_id: self.gateway_id,
                description: request.description.clone(),
                customer_email: request.customer_email.clone(),
                gateway_response: Some(checkout.raw),
            })
            .await?;

        metrics::record_payment(self.api.provider().as_str(), "created");
        tracing::info!(
            transaction_id = %transaction.transaction_id,
            amount = %transaction.amount,
            currency = %transaction.currency,
            "Payment created"
        );

        Ok(PaymentResponse::created(
            transaction.transaction_id,
            checkout.payment_url,
        ))
    }

    async fn verify_payment(&self, transaction_id: &str) -> bool {
        match self.api.is_paid(transaction_id).await {
            Ok(paid) => paid,
            Err(e) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    provider = %self.api.provider(),
                    error = %e,
                    "Payment verification failed"
                );
                false
            }
        }
    }

    #[tracing::instrument(skip_all, fields(gateway_id = %self.gateway_id, provider = %self.api.provider()))]
    async fn process_webhook(
        &self,
        raw_payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, AppError> {
        let provider = self.api.provider().as_str();

        if !self.api.verify_webhook_signature(raw_payload, signature) {
            tracing::warn!("Webhook signature verification failed");
            metrics::record_webhook(provider, "invalid_signature");
            return Err(AppError::InvalidSignature);
        }

        let parsed = self.api.parse_webhook(raw_payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook event");
            AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
        })?;

        let event = NewWebhookEvent {
            gateway_id: self.gateway_id,
            event_id: parsed.event_id,
            event_type: parsed.event_type,
            transaction_id: parsed.transaction_id,
            payload: parsed.payload,
        };

        let outcome = self
            .store
            .apply_webhook(&event, parsed.settlement.as_ref())
            .await?;

        if outcome.duplicate {
            metrics::record_webhook(provider, "duplicate");
            tracing::info!(event_id = %outcome.event_id, "Duplicate webhook delivery ignored");
        } else {
            metrics::record_webhook(provider, "processed");
            tracing::info!(
                event_id = %outcome.event_id,
                event_type = %outcome.event_type,
                transaction_id = ?outcome.transaction_id,
                status = ?outcome.status,
                "Webhook processed"
            );
        }

        Ok(outcome)
    }

    #[tracing::instrument(skip(self), fields(gateway_id = %self.gateway_id, provider = %self.api.provider()))]
    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<RefundResponse, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Refund amount must be positive"
            )));
        }

        let _guard = self.locks.lock(&format!("refund:{}", transaction_id)).await;

        let transaction = self
            .store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

        if transaction.gateway_id != self.gateway_id {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Transaction not found for this gateway"
            )));
        }

        if transaction.status != TransactionStatus::Success {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Transaction is {} and cannot be refunded",
                transaction.status
            )));
        }

        if amount > transaction.amount {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Refund amount {} exceeds transaction amount {}",
                amount,
                transaction.amount
            )));
        }

        let refund = match self.api.refund(&transaction, amount).await {
            Ok(refund) => refund,
            Err(e) => {
                tracing::error!(error = %e, "Refund failed at provider");
                metrics::record_refund(self.api.provider().as_str(), "provider_error");
                return Ok(RefundResponse::failed(e.to_string()));
            }
        };

        let updated = self
            .store
            .apply_refund(transaction_id, amount)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState(anyhow::anyhow!(
                    "Transaction changed state while refunding"
                ))
            })?;

        metrics::record_refund(self.api.provider().as_str(), updated.status.as_str());
        tracing::info!(
            transaction_id = %transaction_id,
            refund_id = %refund.refund_id,
            provider_status = %refund.status,
            status = %updated.status,
            "Refund recorded"
        );

        Ok(RefundResponse {
            success: true,
            refund_id: Some(refund.refund_id),
            status: Some(updated.status),
            refund_amount: updated.refund_amount,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(50000, 2)).unwrap(), 50000);
        assert_eq!(to_minor_units(Decimal::new(1999, 2)).unwrap(), 1999);
        assert_eq!(to_minor_units(Decimal::new(25, 0)).unwrap(), 2500);
        assert!(to_minor_units(Decimal::new(-5, 0)).is_err());
    }
}
