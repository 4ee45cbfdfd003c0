//! Per client+route rate limiting.
//!
//! One [`RouteRateLimiter`] is built at startup and shared through router
//! state. Keys are `(client ip, route path)`; idle keys are dropped by
//! [`RouteRateLimiter::spawn_sweeper`].

use crate::config::RateLimitSettings;
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinHandle;

/// Limiter key: who is calling and which route they hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub client: IpAddr,
    pub route: String,
}

type KeyedLimiter = RateLimiter<RouteKey, DashMapStateStore<RouteKey>, DefaultClock>;

#[derive(Clone)]
pub struct RouteRateLimiter {
    limiter: Arc<KeyedLimiter>,
    prefix: Arc<str>,
    sweep_interval: Duration,
}

impl RouteRateLimiter {
    /// Build a limiter allowing `attempts` requests per `window_seconds` for
    /// every client+route pair whose path starts with `prefix`.
    pub fn new(attempts: u32, window_seconds: u64, prefix: &str) -> Self {
        let attempts = attempts.max(1);
        let period = Duration::from_millis(((window_seconds * 1000) / attempts as u64).max(1));
        let burst = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::dashmap(quota)),
            prefix: Arc::from(prefix),
            sweep_interval: Duration::from_secs(300),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings, prefix: &str) -> Self {
        let mut limiter = Self::new(settings.requests, settings.window_seconds, prefix);
        limiter.sweep_interval = Duration::from_secs(settings.sweep_interval_seconds.max(1));
        limiter
    }

    /// Whether `path` is subject to limiting.
    pub fn applies_to(&self, path: &str) -> bool {
        path.starts_with(&*self.prefix)
    }

    /// Consume one request for `key`; on rejection returns seconds to wait.
    pub fn check(&self, key: &RouteKey) -> Result<(), u64> {
        self.limiter.check_key(key).map_err(|negative| {
            negative
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1)
        })
    }

    /// Number of tracked client+route keys.
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }

    /// Drop keys whose state has fully replenished.
    pub fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Start the periodic sweep. The returned handle is owned by the
    /// application and aborted on shutdown.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep();
                tracing::debug!(keys = limiter.tracked_keys(), "Rate limiter swept");
            }
        })
    }
}

fn client_ip(request: &Request) -> IpAddr {
    let forwarded_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded_ip
        .or_else(|| {
            request
                .extensions()
                .get::<axum::extract::ConnectInfo<SocketAddr>>()
                .map(|axum::extract::ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Middleware applying the shared [`RouteRateLimiter`].
pub async fn route_rate_limit_middleware(
    State(limiter): State<RouteRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    if !limiter.applies_to(path) {
        return Ok(next.run(request).await);
    }

    let key = RouteKey {
        client: client_ip(&request),
        route: path.to_string(),
    };

    match limiter.check(&key) {
        Ok(()) => Ok(next.run(request).await),
        Err(wait_secs) => {
            tracing::warn!(client = %key.client, route = %key.route, "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                "Rate limit exceeded".to_string(),
                Some(wait_secs),
            ))
        }
    }
}
