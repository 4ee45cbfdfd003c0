//! Request and response bodies for the payment API.

use crate::models::{FeePayment, TransactionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn default_currency() -> String {
    "INR".to_string()
}

pub(crate) fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("amount_must_be_positive"))
    }
}

/// Provider-independent payment request.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PaymentRequest {
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(length(min = 1, max = 128))]
    pub order_id: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1), email)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: String,
    pub customer_phone: Option<String>,
    #[validate(url)]
    pub return_url: Option<String>,
    #[validate(url)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentResponse {
    pub fn created(transaction_id: String, payment_url: String) -> Self {
        Self {
            success: true,
            payment_url: Some(payment_url),
            transaction_id: Some(transaction_id),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payment_url: None,
            transaction_id: None,
            error: Some(error.into()),
        }
    }
}

/// `POST /api/payments` body: a payment request plus an optional gateway.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub gateway_id: Option<Uuid>,
    #[serde(flatten)]
    pub payment: PaymentRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefundResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            refund_id: None,
            status: None,
            refund_amount: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub transaction_id: String,
    pub paid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub duplicate: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeePaymentRequest {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
    #[validate(range(min = 1, max = 12))]
    pub semester: i32,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[validate(email)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: String,
    pub gateway_id: Option<Uuid>,
    pub return_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeePaymentResponse {
    pub fee_payment: FeePayment,
    pub payment: PaymentResponse,
}
