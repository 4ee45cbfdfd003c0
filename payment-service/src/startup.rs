//! Application startup and lifecycle management.

use crate::config::PaymentConfig;
use crate::handlers;
use crate::services::{Database, GatewaySettings, PaymentGatewayFactory, PaymentStore};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, route_rate_limit_middleware,
    security_headers_middleware, RouteRateLimiter, REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PaymentStore>,
    pub factory: PaymentGatewayFactory,
}

impl AppState {
    pub fn new(store: Arc<dyn PaymentStore>, settings: GatewaySettings) -> Self {
        let factory = PaymentGatewayFactory::new(store.clone(), settings);
        Self { store, factory }
    }
}

/// Routes and middleware, independent of how the store is backed.
pub fn build_router(state: AppState, limiter: RouteRateLimiter) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/api/payments", post(handlers::payments::create_payment))
        .route(
            "/api/payments/webhook/:provider",
            post(handlers::webhook::receive_webhook),
        )
        .route(
            "/api/payments/:transaction_id",
            get(handlers::payments::get_payment),
        )
        .route(
            "/api/payments/:transaction_id/verify",
            get(handlers::payments::verify_payment),
        )
        .route(
            "/api/payments/:transaction_id/refund",
            post(handlers::payments::refund_payment),
        )
        .route(
            "/api/fees/payments",
            post(handlers::fees::create_fee_payment).get(handlers::fees::list_fee_payments),
        )
        .layer(from_fn_with_state(limiter, route_rate_limit_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    limiter: RouteRateLimiter,
}

impl Application {
    /// Connect to PostgreSQL, run migrations and bind the listener.
    pub async fn build(config: PaymentConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        Self::build_with_store(config, Arc::new(db)).await
    }

    /// Bind the listener around an existing store.
    pub async fn build_with_store(
        config: PaymentConfig,
        store: Arc<dyn PaymentStore>,
    ) -> Result<Self, AppError> {
        let limiter = RouteRateLimiter::from_settings(&config.common.rate_limit, "/api/");
        let state = AppState::new(store, config.gateways.clone());
        let router = build_router(state, limiter.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Payment service listening");

        Ok(Self {
            port,
            listener,
            router,
            limiter,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the future is dropped. Owns the rate limiter sweeper.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let sweeper = self.limiter.spawn_sweeper();

        let result = axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;

        sweeper.abort();
        result
    }
}
