use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    /// Proposed schedule overlaps existing entries; carries the conflicting rows.
    #[error("Scheduling conflict detected")]
    ScheduleConflict(serde_json::Value),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid state: {0}")]
    InvalidState(anyhow::Error),

    #[error("Unsupported payment provider: {0}")]
    UnsupportedProvider(String),

    #[error("No default payment gateway configured")]
    NoDefaultGateway,

    #[error("Payment provider error: {0}")]
    ProviderError(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error kind returned in the `code` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ScheduleConflict(_) => "SCHEDULE_CONFLICT",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            AppError::NoDefaultGateway => "NO_DEFAULT_GATEWAY",
            AppError::ProviderError(_) => "PROVIDER_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::TooManyRequests(..) => "RATE_LIMITED",
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ConfigError(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            code: &'static str,
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        let code = self.code();

        let (status, error_message, details, retry_after) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                serde_json::to_value(&err).ok(),
                None,
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None, None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None, None),
            AppError::ScheduleConflict(conflicts) => (
                StatusCode::CONFLICT,
                "Scheduling conflict detected".to_string(),
                Some(conflicts),
                None,
            ),
            // Never echo anything about why the signature was rejected.
            AppError::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "Invalid signature".to_string(),
                None,
                None,
            ),
            AppError::InvalidState(err) => (StatusCode::CONFLICT, err.to_string(), None, None),
            AppError::UnsupportedProvider(provider) => (
                StatusCode::BAD_REQUEST,
                format!("Unsupported payment provider: {}", provider),
                None,
                None,
            ),
            AppError::NoDefaultGateway => (
                StatusCode::NOT_FOUND,
                "No default payment gateway configured".to_string(),
                None,
                None,
            ),
            AppError::ProviderError(err) => {
                tracing::error!(error = %err, "Payment provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment provider request failed".to_string(),
                    None,
                    None,
                )
            }
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None, None),
            AppError::TooManyRequests(msg, retry) => {
                (StatusCode::TOO_MANY_REQUESTS, msg, None, retry)
            }
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                    None,
                )
            }
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
                None,
                None,
            ),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                    None,
                )
            }
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                Some(serde_json::Value::String(err.to_string())),
                None,
            ),
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                code,
                error: error_message,
                details,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::InvalidSignature.code(), "INVALID_SIGNATURE");
        assert_eq!(
            AppError::ScheduleConflict(serde_json::json!([])).code(),
            "SCHEDULE_CONFLICT"
        );
        assert_eq!(
            AppError::BadRequest(anyhow::anyhow!("amount must be positive")).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            AppError::UnsupportedProvider("paypal".to_string()).code(),
            "UNSUPPORTED_PROVIDER"
        );
    }

    #[test]
    fn test_status_mapping() {
        let res = AppError::ScheduleConflict(serde_json::json!([])).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = AppError::InvalidSignature.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = AppError::InvalidState(anyhow::anyhow!("not refundable")).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = AppError::ProviderError(anyhow::anyhow!("timeout")).into_response();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_retry_after_header() {
        let res = AppError::TooManyRequests("slow down".to_string(), Some(12)).into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            res.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "12"
        );
    }
}
