//! Webhook events and the settlements they carry.

use super::TransactionStatus;
use serde::Serialize;
use uuid::Uuid;

/// How a webhook refers to the transaction it settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementTarget {
    /// Provider transaction id (order id / checkout session id).
    TransactionId(String),
    /// Merchant order id, for events that only carry metadata.
    OrderId(String),
}

/// Outcome a provider reported for one transaction.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub target: SettlementTarget,
    pub status: TransactionStatus,
    pub provider_payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub response: serde_json::Value,
}

impl Settlement {
    pub fn succeeded(
        target: SettlementTarget,
        provider_payment_id: Option<String>,
        response: serde_json::Value,
    ) -> Self {
        Self {
            target,
            status: TransactionStatus::Success,
            provider_payment_id,
            failure_reason: None,
            response,
        }
    }

    pub fn failed(
        target: SettlementTarget,
        failure_reason: Option<String>,
        response: serde_json::Value,
    ) -> Self {
        Self {
            target,
            status: TransactionStatus::Failed,
            provider_payment_id: None,
            failure_reason,
            response,
        }
    }
}

/// A verified delivery, ready to be recorded.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub gateway_id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub transaction_id: Option<String>,
    pub payload: serde_json::Value,
}

/// Result of applying one delivery.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub event_type: String,
    /// The event was seen before and nothing changed.
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// New transaction status when this delivery moved it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
}
