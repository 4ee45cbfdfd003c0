//! Domain models for payment-service.

pub mod fee;
pub mod gateway;
pub mod transaction;
pub mod webhook;

pub use fee::{FeePayment, FeePaymentFilter, FeePaymentStatus, NewFeePayment};
pub use gateway::{GatewayConfig, GatewayMode, PaymentGatewayRecord, Provider};
pub use transaction::{NewTransaction, PaymentTransaction, TransactionStatus};
pub use webhook::{NewWebhookEvent, Settlement, SettlementTarget, WebhookOutcome};
