//! Payment transactions and their state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `PENDING -> SUCCESS | FAILED`, `SUCCESS -> REFUNDED | PARTIAL_REFUND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Refunded,
    PartialRefund,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
            Self::PartialRefund => "PARTIAL_REFUND",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "REFUNDED" => Some(Self::Refunded),
            "PARTIAL_REFUND" => Some(Self::PartialRefund),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Success) | (Pending, Failed) | (Success, Refunded) | (Success, PartialRefund)
        )
    }

    /// Status after refunding `amount` of `total`.
    pub fn after_refund(amount: Decimal, total: Decimal) -> Self {
        if amount == total {
            Self::Refunded
        } else {
            Self::PartialRefund
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    /// Provider-issued id (Razorpay order id, Stripe checkout session id).
    pub transaction_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub gateway_id: Uuid,
    pub description: String,
    pub customer_email: String,
    pub provider_payment_id: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a freshly created provider payment.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub gateway_id: Uuid,
    pub description: String,
    pub customer_email: String,
    pub gateway_response: Option<serde_json::Value>,
}
