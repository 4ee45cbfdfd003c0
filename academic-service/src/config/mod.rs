//! Configuration module for academic-service.

use crate::services::database::DEFAULT_SERIALIZATION_RETRIES;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

pub const DEFAULT_MAX_MARK_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct AcademicConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub settings: AcademicSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AcademicSettings {
    /// Upper bound on rows accepted by `POST /api/marks/batch`.
    pub max_mark_batch: usize,
    /// Attempts for a timetable insert that keeps failing serialization.
    pub serialization_retries: u32,
}

impl Default for AcademicSettings {
    fn default() -> Self {
        Self {
            max_mark_batch: DEFAULT_MAX_MARK_BATCH,
            serialization_retries: DEFAULT_SERIALIZATION_RETRIES,
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl AcademicConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "academic-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: Secret::new(env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?),
                max_connections: parsed_env("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
                min_connections: parsed_env("DATABASE_MIN_CONNECTIONS").unwrap_or(2),
            },
            settings: AcademicSettings {
                max_mark_batch: parsed_env("MAX_MARK_BATCH").unwrap_or(DEFAULT_MAX_MARK_BATCH),
                serialization_retries: parsed_env("SERIALIZATION_RETRIES")
                    .unwrap_or(DEFAULT_SERIALIZATION_RETRIES),
            },
        })
    }
}
