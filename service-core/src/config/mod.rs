use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings shared by every service, read from `configuration.*` and `APP__*`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// Per client+route request budget for `/api` routes.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    #[serde(default = "default_requests")]
    pub requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_sweep_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            window_seconds: default_window_seconds(),
            sweep_interval_seconds: default_sweep_seconds(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

fn default_sweep_seconds() -> u64 {
    300
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_defaults() {
        let settings = RateLimitSettings::default();
        assert_eq!(settings.requests, 10);
        assert_eq!(settings.window_seconds, 60);
        assert_eq!(settings.sweep_interval_seconds, 300);
    }
}
