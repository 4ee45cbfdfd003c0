//! Persistence seam for payment-service.
//!
//! [`PaymentStore`] is implemented by the PostgreSQL [`Database`] and by
//! [`InMemoryPaymentStore`], which backs the HTTP tests.
//!
//! [`Database`]: crate::services::database::Database

use crate::models::{
    FeePayment, FeePaymentFilter, FeePaymentStatus, NewFeePayment, NewTransaction,
    NewWebhookEvent, PaymentGatewayRecord, PaymentTransaction, Provider, Settlement,
    SettlementTarget, TransactionStatus, WebhookOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn upsert_gateway(&self, gateway: &PaymentGatewayRecord) -> Result<(), AppError>;

    async fn get_gateway(&self, id: Uuid) -> Result<Option<PaymentGatewayRecord>, AppError>;

    /// The active gateway flagged as default.
    async fn get_default_gateway(&self) -> Result<Option<PaymentGatewayRecord>, AppError>;

    /// An active gateway for `provider`, preferring the default one.
    async fn find_gateway_by_provider(
        &self,
        provider: Provider,
    ) -> Result<Option<PaymentGatewayRecord>, AppError>;

    async fn insert_transaction(&self, tx: &NewTransaction)
        -> Result<PaymentTransaction, AppError>;

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, AppError>;

    /// Record a verified webhook and apply its settlement as one unit.
    ///
    /// A repeated `(gateway_id, event_id)` is a no-op reported as duplicate.
    /// Only a PENDING transaction is moved; fee payments linked to it follow.
    async fn apply_webhook(
        &self,
        event: &NewWebhookEvent,
        settlement: Option<&Settlement>,
    ) -> Result<WebhookOutcome, AppError>;

    /// Move a SUCCESS transaction to REFUNDED or PARTIAL_REFUND.
    ///
    /// Returns `None` when the transaction is no longer SUCCESS or `amount`
    /// exceeds its total.
    async fn apply_refund(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<Option<PaymentTransaction>, AppError>;

    async fn count_webhook_events(&self, gateway_id: Uuid) -> Result<i64, AppError>;

    async fn insert_fee_payment(&self, fee: &NewFeePayment) -> Result<FeePayment, AppError>;

    async fn link_fee_payment(&self, id: Uuid, transaction_id: &str) -> Result<(), AppError>;

    async fn set_fee_payment_status(
        &self,
        id: Uuid,
        status: FeePaymentStatus,
    ) -> Result<(), AppError>;

    /// Matching fee payments, newest first.
    async fn list_fee_payments(
        &self,
        filter: &FeePaymentFilter,
    ) -> Result<Vec<FeePayment>, AppError>;
}

/// Fee payment status implied by a transaction status, if any.
pub fn fee_status_for(status: TransactionStatus) -> Option<FeePaymentStatus> {
    match status {
        TransactionStatus::Success => Some(FeePaymentStatus::Completed),
        TransactionStatus::Failed => Some(FeePaymentStatus::Failed),
        TransactionStatus::Refunded => Some(FeePaymentStatus::Refunded),
        TransactionStatus::Pending | TransactionStatus::PartialRefund => None,
    }
}

/// Fee payment status a cascade may move from.
fn fee_cascade_source(target: FeePaymentStatus) -> FeePaymentStatus {
    match target {
        FeePaymentStatus::Refunded => FeePaymentStatus::Completed,
        _ => FeePaymentStatus::Pending,
    }
}

#[derive(Debug, Clone)]
struct StoredWebhookEvent {
    gateway_id: Uuid,
    event_id: String,
}

#[derive(Default)]
struct MemoryState {
    gateways: HashMap<Uuid, PaymentGatewayRecord>,
    transactions: HashMap<String, PaymentTransaction>,
    webhook_events: Vec<StoredWebhookEvent>,
    fee_payments: Vec<FeePayment>,
}

impl MemoryState {
    fn resolve(&self, gateway_id: Uuid, target: &SettlementTarget) -> Option<String> {
        match target {
            SettlementTarget::TransactionId(id) => self
                .transactions
                .get(id)
                .filter(|tx| tx.gateway_id == gateway_id)
                .map(|tx| tx.transaction_id.clone()),
            SettlementTarget::OrderId(order_id) => self
                .transactions
                .values()
                .filter(|tx| {
                    tx.gateway_id == gateway_id
                        && &tx.order_id == order_id
                        && tx.status == TransactionStatus::Pending
                })
                .max_by_key(|tx| tx.created_at)
                .map(|tx| tx.transaction_id.clone()),
        }
    }

    fn cascade_fees(&mut self, transaction_id: &str, status: TransactionStatus) {
        if let Some(target) = fee_status_for(status) {
            let source = fee_cascade_source(target);
            for fee in self.fee_payments.iter_mut().filter(|f| {
                f.transaction_id.as_deref() == Some(transaction_id) && f.status == source
            }) {
                fee.status = target;
            }
        }
    }
}

/// Process-local store with the same transition rules as PostgreSQL.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    state: Mutex<MemoryState>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.state().map(|_| ())
    }

    async fn upsert_gateway(&self, gateway: &PaymentGatewayRecord) -> Result<(), AppError> {
        let mut state = self.state()?;
        if gateway.is_default && gateway.is_active {
            for other in state.gateways.values_mut() {
                other.is_default = false;
            }
        }
        state.gateways.insert(gateway.id, gateway.clone());
        Ok(())
    }

    async fn get_gateway(&self, id: Uuid) -> Result<Option<PaymentGatewayRecord>, AppError> {
        Ok(self.state()?.gateways.get(&id).cloned())
    }

    async fn get_default_gateway(&self) -> Result<Option<PaymentGatewayRecord>, AppError> {
        Ok(self
            .state()?
            .gateways
            .values()
            .find(|g| g.is_default && g.is_active)
            .cloned())
    }

    async fn find_gateway_by_provider(
        &self,
        provider: Provider,
    ) -> Result<Option<PaymentGatewayRecord>, AppError> {
        Ok(self
            .state()?
            .gateways
            .values()
            .filter(|g| g.is_active && g.provider.eq_ignore_ascii_case(provider.as_str()))
            .max_by_key(|g| g.is_default)
            .cloned())
    }

    async fn insert_transaction(
        &self,
        tx: &NewTransaction,
    ) -> Result<PaymentTransaction, AppError> {
        let mut state = self.state()?;
        if state.transactions.contains_key(&tx.transaction_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Transaction '{}' already exists",
                tx.transaction_id
            )));
        }

        let now = Utc::now();
        let record = PaymentTransaction {
            id: Uuid::new_v4(),
            transaction_id: tx.transaction_id.clone(),
            order_id: tx.order_id.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            status: TransactionStatus::Pending,
            gateway_id: tx.gateway_id,
            description: tx.description.clone(),
            customer_email: tx.customer_email.clone(),
            provider_payment_id: None,
            refund_amount: None,
            refunded_at: None,
            failure_reason: None,
            gateway_response: tx.gateway_response.clone(),
            created_at: now,
            updated_at: now,
        };
        state
            .transactions
            .insert(record.transaction_id.clone(), record.clone());
        Ok(record)
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        Ok(self.state()?.transactions.get(transaction_id).cloned())
    }

    async fn apply_webhook(
        &self,
        event: &NewWebhookEvent,
        settlement: Option<&Settlement>,
    ) -> Result<WebhookOutcome, AppError> {
        let mut state = self.state()?;

        let seen = state
            .webhook_events
            .iter()
            .any(|e| e.gateway_id == event.gateway_id && e.event_id == event.event_id);
        if seen {
            return Ok(WebhookOutcome {
                event_id: event.event_id.clone(),
                event_type: event.event_type.clone(),
                duplicate: true,
                transaction_id: event.transaction_id.clone(),
                status: None,
            });
        }

        state.webhook_events.push(StoredWebhookEvent {
            gateway_id: event.gateway_id,
            event_id: event.event_id.clone(),
        });

        let mut outcome = WebhookOutcome {
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            duplicate: false,
            transaction_id: event.transaction_id.clone(),
            status: None,
        };

        let Some(settlement) = settlement else {
            return Ok(outcome);
        };
        let Some(transaction_id) = state.resolve(event.gateway_id, &settlement.target) else {
            tracing::warn!(settlement_target = ?settlement.target, "Webhook references unknown transaction");
            return Ok(outcome);
        };
        outcome.transaction_id = Some(transaction_id.clone());

        if let Some(tx) = state.transactions.get_mut(&transaction_id) {
            if tx.status == TransactionStatus::Pending
                && tx.status.can_transition_to(settlement.status)
            {
                tx.status = settlement.status;
                if settlement.provider_payment_id.is_some() {
                    tx.provider_payment_id = settlement.provider_payment_id.clone();
                }
                tx.failure_reason = settlement.failure_reason.clone();
                tx.gateway_response = Some(settlement.response.clone());
                tx.updated_at = Utc::now();
                outcome.status = Some(settlement.status);
            }
        }

        if let Some(status) = outcome.status {
            state.cascade_fees(&transaction_id, status);
        }

        Ok(outcome)
    }

    async fn apply_refund(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let mut state = self.state()?;

        let updated = match state.transactions.get_mut(transaction_id) {
            Some(tx) if tx.status == TransactionStatus::Success && amount <= tx.amount => {
                tx.status = TransactionStatus::after_refund(amount, tx.amount);
                tx.refund_amount = Some(amount);
                tx.refunded_at = Some(Utc::now());
                tx.updated_at = Utc::now();
                tx.clone()
            }
            _ => return Ok(None),
        };

        state.cascade_fees(transaction_id, updated.status);
        Ok(Some(updated))
    }

    async fn count_webhook_events(&self, gateway_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .state()?
            .webhook_events
            .iter()
            .filter(|e| e.gateway_id == gateway_id)
            .count() as i64)
    }

    async fn insert_fee_payment(&self, fee: &NewFeePayment) -> Result<FeePayment, AppError> {
        let record = FeePayment {
            id: Uuid::new_v4(),
            student_id: fee.student_id.clone(),
            amount: fee.amount,
            status: FeePaymentStatus::Pending,
            transaction_id: None,
            semester: fee.semester,
            year: fee.year,
            created_at: Utc::now(),
        };
        self.state()?.fee_payments.push(record.clone());
        Ok(record)
    }

    async fn link_fee_payment(&self, id: Uuid, transaction_id: &str) -> Result<(), AppError> {
        let mut state = self.state()?;
        let fee = state
            .fee_payments
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Fee payment not found")))?;
        fee.transaction_id = Some(transaction_id.to_string());
        Ok(())
    }

    async fn set_fee_payment_status(
        &self,
        id: Uuid,
        status: FeePaymentStatus,
    ) -> Result<(), AppError> {
        let mut state = self.state()?;
        let fee = state
            .fee_payments
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Fee payment not found")))?;
        fee.status = status;
        Ok(())
    }

    async fn list_fee_payments(
        &self,
        filter: &FeePaymentFilter,
    ) -> Result<Vec<FeePayment>, AppError> {
        let mut fees: Vec<FeePayment> = self
            .state()?
            .fee_payments
            .iter()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect();
        fees.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(fees)
    }
}
