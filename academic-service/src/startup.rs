//! Application startup and lifecycle management.

use crate::config::{AcademicConfig, AcademicSettings};
use crate::handlers;
use crate::services::{AcademicStore, Database, Scheduler};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
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
    pub store: Arc<dyn AcademicStore>,
    pub scheduler: Scheduler,
    pub settings: AcademicSettings,
}

impl AppState {
    pub fn new(store: Arc<dyn AcademicStore>, settings: AcademicSettings) -> Self {
        let scheduler = Scheduler::new(store.clone());
        Self {
            store,
            scheduler,
            settings,
        }
    }
}

/// Routes and middleware, independent of how the store is backed.
pub fn build_router(state: AppState, limiter: RouteRateLimiter) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/api/subjects",
            post(handlers::subjects::create_subject).get(handlers::subjects::list_subjects),
        )
        .route(
            "/api/timetable",
            get(handlers::timetable::list_timetable)
                .post(handlers::timetable::create_timetable_entry),
        )
        .route(
            "/api/timetable/check",
            post(handlers::timetable::check_timetable_entry),
        )
        .route(
            "/api/timetable/:id",
            delete(handlers::timetable::delete_timetable_entry),
        )
        .route(
            "/api/marks",
            post(handlers::marks::create_mark).get(handlers::marks::list_marks),
        )
        .route("/api/marks/batch", post(handlers::marks::create_marks_batch))
        .route(
            "/api/students/:student_id/transcript",
            get(handlers::students::get_transcript),
        )
        .route(
            "/api/students/:student_id/attendance",
            get(handlers::students::get_attendance),
        )
        .route(
            "/api/analytics/performance",
            get(handlers::analytics::performance),
        )
        .route(
            "/api/attendance",
            post(handlers::attendance::record_attendance),
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
    pub async fn build(config: AcademicConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?
        .with_serialization_retries(config.settings.serialization_retries);
        db.run_migrations().await?;

        Self::build_with_store(config, Arc::new(db)).await
    }

    /// Bind the listener around an existing store.
    pub async fn build_with_store(
        config: AcademicConfig,
        store: Arc<dyn AcademicStore>,
    ) -> Result<Self, AppError> {
        let limiter = RouteRateLimiter::from_settings(&config.common.rate_limit, "/api/");
        let state = AppState::new(store, config.settings.clone());
        let router = build_router(state, limiter.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Academic service listening");

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
