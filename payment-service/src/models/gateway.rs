//! Configured payment gateways.

use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use uuid::Uuid;

/// Supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Razorpay,
    Stripe,
}

impl Provider {
    /// Case-insensitive lookup; unknown names are rejected.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "razorpay" => Ok(Self::Razorpay),
            "stripe" => Ok(Self::Stripe),
            _ => Err(AppError::UnsupportedProvider(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Razorpay => "razorpay",
            Self::Stripe => "stripe",
        }
    }

    /// Header carrying the webhook signature for this provider.
    pub fn signature_header(&self) -> &'static str {
        match self {
            Self::Razorpay => "x-razorpay-signature",
            Self::Stripe => "stripe-signature",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    #[default]
    Test,
    Live,
}

/// Provider credentials stored as JSON on the gateway row.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub api_key: String,
    pub secret: String,
    pub webhook_secret: String,
    #[serde(default)]
    pub mode: GatewayMode,
    /// Overrides the provider's public API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &self.api_key)
            .field("secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("mode", &self.mode)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// A configured gateway as stored.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentGatewayRecord {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub is_default: bool,
}

impl PaymentGatewayRecord {
    pub fn parsed_provider(&self) -> Result<Provider, AppError> {
        Provider::parse(&self.provider)
    }

    pub fn parsed_config(&self) -> Result<GatewayConfig, AppError> {
        serde_json::from_value(self.config.clone()).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid configuration for gateway {}: {}",
                self.id,
                e
            ))
        })
    }
}
