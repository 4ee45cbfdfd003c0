//! Resolves configured gateways into [`PaymentGateway`] implementations.

use crate::models::{PaymentGatewayRecord, Provider};
use crate::services::gateway::{Gateway, PaymentGateway};
use crate::services::razorpay::{RazorpayClient, RazorpayConfig};
use crate::services::store::PaymentStore;
use crate::services::stripe::{StripeClient, StripeConfig, DEFAULT_WEBHOOK_TOLERANCE_SECS};
use service_core::error::AppError;
use service_core::utils::KeyedLocks;
use std::sync::Arc;
use uuid::Uuid;

pub type RazorpayGateway = Gateway<RazorpayClient>;
pub type StripeGateway = Gateway<StripeClient>;

/// Settings shared by every gateway instance.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Public base URL of the campus portal, used for checkout and return pages.
    pub app_base_url: String,
    pub webhook_tolerance_secs: i64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            app_base_url: "http://localhost:3000".to_string(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

#[derive(Clone)]
pub struct PaymentGatewayFactory {
    store: Arc<dyn PaymentStore>,
    settings: GatewaySettings,
    locks: KeyedLocks,
}

impl PaymentGatewayFactory {
    pub fn new(store: Arc<dyn PaymentStore>, settings: GatewaySettings) -> Self {
        Self {
            store,
            settings,
            locks: KeyedLocks::new(),
        }
    }

    /// Build the gateway with `gateway_id`. Missing or inactive gateways are
    /// not found; unknown providers are unsupported.
    #[tracing::instrument(skip(self))]
    pub async fn create_gateway(
        &self,
        gateway_id: Uuid,
    ) -> Result<Arc<dyn PaymentGateway>, AppError> {
        let record = self
            .store
            .get_gateway(gateway_id)
            .await?
            .filter(|g| g.is_active)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Payment gateway not found or inactive"))
            })?;

        self.build(&record)
    }

    pub async fn get_default_gateway(&self) -> Result<Arc<dyn PaymentGateway>, AppError> {
        let record = self
            .store
            .get_default_gateway()
            .await?
            .ok_or(AppError::NoDefaultGateway)?;

        self.build(&record)
    }

    /// Active gateway for `provider`, preferring the default.
    pub async fn gateway_for_provider(
        &self,
        provider: Provider,
    ) -> Result<Arc<dyn PaymentGateway>, AppError> {
        let record = self
            .store
            .find_gateway_by_provider(provider)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "No active {} gateway configured",
                    provider
                ))
            })?;

        self.build(&record)
    }

    /// The requested gateway, or the default when none is given.
    pub async fn resolve(
        &self,
        gateway_id: Option<Uuid>,
    ) -> Result<Arc<dyn PaymentGateway>, AppError> {
        match gateway_id {
            Some(id) => self.create_gateway(id).await,
            None => self.get_default_gateway().await,
        }
    }

    fn build(&self, record: &PaymentGatewayRecord) -> Result<Arc<dyn PaymentGateway>, AppError> {
        let provider = record.parsed_provider()?;
        let config = record.parsed_config()?;

        let gateway: Arc<dyn PaymentGateway> = match provider {
            Provider::Razorpay => Arc::new(RazorpayGateway::new(
                record.id,
                RazorpayClient::new(RazorpayConfig::from_gateway_config(
                    &config,
                    &self.settings.app_base_url,
                )),
                self.store.clone(),
                self.locks.clone(),
            )),
            Provider::Stripe => Arc::new(StripeGateway::new(
                record.id,
                StripeClient::new(StripeConfig::from_gateway_config(
                    &config,
                    &self.settings.app_base_url,
                    self.settings.webhook_tolerance_secs,
                )),
                self.store.clone(),
                self.locks.clone(),
            )),
        };

        tracing::debug!(gateway_id = %record.id, provider = %provider, "Payment gateway resolved");
        Ok(gateway)
    }
}
