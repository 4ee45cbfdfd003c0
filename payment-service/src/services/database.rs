//! PostgreSQL store for payment-service.

use crate::models::{
    FeePayment, FeePaymentFilter, FeePaymentStatus, NewFeePayment, NewTransaction,
    NewWebhookEvent, PaymentGatewayRecord, PaymentTransaction, Provider, Settlement,
    SettlementTarget, TransactionStatus, WebhookOutcome,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{fee_status_for, PaymentStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "id, transaction_id, order_id, amount, currency, status, gateway_id, \
     description, customer_email, provider_payment_id, refund_amount, refunded_at, \
     failure_reason, gateway_response, created_at, updated_at";

const FEE_PAYMENT_COLUMNS: &str =
    "id, student_id, amount, status, transaction_id, semester, year, created_at";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_id: String,
    order_id: String,
    amount: Decimal,
    currency: String,
    status: String,
    gateway_id: Uuid,
    description: String,
    customer_email: String,
    provider_payment_id: Option<String>,
    refund_amount: Option<Decimal>,
    refunded_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    gateway_response: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = TransactionStatus::parse(&row.status).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unknown transaction status '{}'",
                row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            transaction_id: row.transaction_id,
            order_id: row.order_id,
            amount: row.amount,
            currency: row.currency,
            status,
            gateway_id: row.gateway_id,
            description: row.description,
            customer_email: row.customer_email,
            provider_payment_id: row.provider_payment_id,
            refund_amount: row.refund_amount,
            refunded_at: row.refunded_at,
            failure_reason: row.failure_reason,
            gateway_response: row.gateway_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct FeePaymentRow {
    id: Uuid,
    student_id: String,
    amount: Decimal,
    status: String,
    transaction_id: Option<String>,
    semester: i32,
    year: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeePaymentRow> for FeePayment {
    type Error = AppError;

    fn try_from(row: FeePaymentRow) -> Result<Self, Self::Error> {
        let status = FeePaymentStatus::parse(&row.status).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unknown fee payment status '{}'",
                row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            amount: row.amount,
            status,
            transaction_id: row.transaction_id,
            semester: row.semester,
            year: row.year,
            created_at: row.created_at,
        })
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(database_url), fields(service = "payment-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, gateway), fields(gateway_id = %gateway.id, provider = %gateway.provider))]
    async fn upsert_gateway(&self, gateway: &PaymentGatewayRecord) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        if gateway.is_default && gateway.is_active {
            sqlx::query(
                "UPDATE payment_gateways SET is_default = FALSE WHERE is_default AND id <> $1",
            )
            .bind(gateway.id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO payment_gateways (id, name, provider, config, is_active, is_default)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                provider = EXCLUDED.provider,
                config = EXCLUDED.config,
                is_active = EXCLUDED.is_active,
                is_default = EXCLUDED.is_default
            "#,
        )
        .bind(gateway.id)
        .bind(&gateway.name)
        .bind(&gateway.provider)
        .bind(&gateway.config)
        .bind(gateway.is_active)
        .bind(gateway.is_default)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_gateway(&self, id: Uuid) -> Result<Option<PaymentGatewayRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_gateway"])
            .start_timer();

        let gateway = sqlx::query_as::<_, PaymentGatewayRecord>(
            "SELECT id, name, provider, config, is_active, is_default FROM payment_gateways WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(gateway)
    }

    async fn get_default_gateway(&self) -> Result<Option<PaymentGatewayRecord>, AppError> {
        let gateway = sqlx::query_as::<_, PaymentGatewayRecord>(
            r#"
            SELECT id, name, provider, config, is_active, is_default
            FROM payment_gateways
            WHERE is_default AND is_active
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(gateway)
    }

    async fn find_gateway_by_provider(
        &self,
        provider: Provider,
    ) -> Result<Option<PaymentGatewayRecord>, AppError> {
        let gateway = sqlx::query_as::<_, PaymentGatewayRecord>(
            r#"
            SELECT id, name, provider, config, is_active, is_default
            FROM payment_gateways
            WHERE is_active AND LOWER(provider) = $1
            ORDER BY is_default DESC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(gateway)
    }

    #[instrument(skip(self, input), fields(transaction_id = %input.transaction_id, order_id = %input.order_id))]
    async fn insert_transaction(
        &self,
        input: &NewTransaction,
    ) -> Result<PaymentTransaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_transaction"])
            .start_timer();

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO payment_transactions
                (id, transaction_id, order_id, amount, currency, status, gateway_id, description, customer_email, gateway_response)
            VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, $8, $9)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.transaction_id)
        .bind(&input.order_id)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(input.gateway_id)
        .bind(&input.description)
        .bind(&input.customer_email)
        .bind(&input.gateway_response)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Transaction '{}' already exists",
                    input.transaction_id
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert transaction: {}", e)),
        })?;

        timer.observe_duration();
        row.try_into()
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions WHERE transaction_id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentTransaction::try_from).transpose()
    }

    #[instrument(skip(self, event, settlement), fields(gateway_id = %event.gateway_id, event_id = %event.event_id, event_type = %event.event_type))]
    async fn apply_webhook(
        &self,
        event: &NewWebhookEvent,
        settlement: Option<&Settlement>,
    ) -> Result<WebhookOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_webhook"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let resolved: Option<String> = match settlement.map(|s| &s.target) {
            Some(SettlementTarget::TransactionId(id)) => {
                sqlx::query_scalar(
                    "SELECT transaction_id FROM payment_transactions WHERE transaction_id = $1 AND gateway_id = $2",
                )
                .bind(id)
                .bind(event.gateway_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            Some(SettlementTarget::OrderId(order_id)) => {
                sqlx::query_scalar(
                    r#"
                    SELECT transaction_id FROM payment_transactions
                    WHERE order_id = $1 AND gateway_id = $2 AND status = 'PENDING'
                    ORDER BY created_at DESC
                    LIMIT 1
                    "#,
                )
                .bind(order_id)
                .bind(event.gateway_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => None,
        };

        let transaction_id = resolved.clone().or_else(|| event.transaction_id.clone());

        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_events (id, gateway_id, event_id, event_type, transaction_id, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (gateway_id, event_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.gateway_id)
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&transaction_id)
        .bind(&event.payload)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            timer.observe_duration();
            return Ok(WebhookOutcome {
                event_id: event.event_id.clone(),
                event_type: event.event_type.clone(),
                duplicate: true,
                transaction_id,
                status: None,
            });
        }

        let mut status = None;
        if let (Some(settlement), Some(id)) = (settlement, resolved.as_deref()) {
            let updated = sqlx::query(
                r#"
                UPDATE payment_transactions
                SET status = $1,
                    provider_payment_id = COALESCE($2, provider_payment_id),
                    failure_reason = $3,
                    gateway_response = $4,
                    updated_at = NOW()
                WHERE transaction_id = $5 AND status = 'PENDING'
                "#,
            )
            .bind(settlement.status.as_str())
            .bind(&settlement.provider_payment_id)
            .bind(&settlement.failure_reason)
            .bind(&settlement.response)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 1 {
                if let Some(fee_status) = fee_status_for(settlement.status) {
                    sqlx::query(
                        "UPDATE fee_payments SET status = $1 WHERE transaction_id = $2 AND status = 'PENDING'",
                    )
                    .bind(fee_status.as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                }
                status = Some(settlement.status);
            }
        }

        tx.commit().await?;
        timer.observe_duration();

        Ok(WebhookOutcome {
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            duplicate: false,
            transaction_id,
            status,
        })
    }

    #[instrument(skip(self))]
    async fn apply_refund(
        &self,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE payment_transactions
            SET status = CASE WHEN $2 = amount THEN 'REFUNDED' ELSE 'PARTIAL_REFUND' END,
                refund_amount = $2,
                refunded_at = NOW(),
                updated_at = NOW()
            WHERE transaction_id = $1 AND status = 'SUCCESS' AND $2 <= amount
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let updated = PaymentTransaction::try_from(row)?;

        if updated.status == TransactionStatus::Refunded {
            sqlx::query(
                "UPDATE fee_payments SET status = 'REFUNDED' WHERE transaction_id = $1 AND status = 'COMPLETED'",
            )
            .bind(transaction_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn count_webhook_events(&self, gateway_id: Uuid) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events WHERE gateway_id = $1")
                .bind(gateway_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    #[instrument(skip(self, input), fields(student_id = %input.student_id))]
    async fn insert_fee_payment(&self, input: &NewFeePayment) -> Result<FeePayment, AppError> {
        let row = sqlx::query_as::<_, FeePaymentRow>(&format!(
            r#"
            INSERT INTO fee_payments (id, student_id, amount, status, semester, year)
            VALUES ($1, $2, $3, 'PENDING', $4, $5)
            RETURNING {}
            "#,
            FEE_PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.student_id)
        .bind(input.amount)
        .bind(input.semester)
        .bind(input.year)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn link_fee_payment(&self, id: Uuid, transaction_id: &str) -> Result<(), AppError> {
        let updated = sqlx::query("UPDATE fee_payments SET transaction_id = $2 WHERE id = $1")
            .bind(id)
            .bind(transaction_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Fee payment not found")));
        }
        Ok(())
    }

    async fn set_fee_payment_status(
        &self,
        id: Uuid,
        status: FeePaymentStatus,
    ) -> Result<(), AppError> {
        let updated = sqlx::query("UPDATE fee_payments SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Fee payment not found")));
        }
        Ok(())
    }

    async fn list_fee_payments(
        &self,
        filter: &FeePaymentFilter,
    ) -> Result<Vec<FeePayment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_fee_payments"])
            .start_timer();

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM fee_payments WHERE TRUE",
            FEE_PAYMENT_COLUMNS
        ));
        if let Some(student_id) = &filter.student_id {
            query.push(" AND student_id = ").push_bind(student_id.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(semester) = filter.semester {
            query.push(" AND semester = ").push_bind(semester);
        }
        if let Some(year) = filter.year {
            query.push(" AND year = ").push_bind(year);
        }
        query.push(" ORDER BY created_at DESC");

        let rows: Vec<FeePaymentRow> = query.build_query_as().fetch_all(&self.pool).await?;

        timer.observe_duration();
        rows.into_iter().map(FeePayment::try_from).collect()
    }
}
