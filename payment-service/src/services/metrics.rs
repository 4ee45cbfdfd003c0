//! Prometheus metrics for payment-service.

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use service_core::observability::{init_metrics_recorder, render_recorder_metrics};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Payment creations by provider and outcome (created, provider_error).
pub static PAYMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("payment_payments_total", "Payment creations by provider and outcome"),
        &["provider", "outcome"],
    )
    .expect("Failed to create payment_payments_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register payment_payments_total");
    counter
});

/// Webhook deliveries by provider and outcome (processed, duplicate, invalid_signature).
pub static WEBHOOKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("payment_webhooks_total", "Webhook deliveries by provider and outcome"),
        &["provider", "outcome"],
    )
    .expect("Failed to create payment_webhooks_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register payment_webhooks_total");
    counter
});

pub static REFUNDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("payment_refunds_total", "Refunds by provider and resulting status"),
        &["provider", "outcome"],
    )
    .expect("Failed to create payment_refunds_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register payment_refunds_total");
    counter
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "payment_db_query_duration_seconds",
            "Database query duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"],
    )
    .expect("Failed to create payment_db_query_duration metric");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Failed to register payment_db_query_duration");
    histogram
});

/// Install the HTTP recorder and force registration of domain metrics.
pub fn init_metrics() {
    init_metrics_recorder();
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&WEBHOOKS_TOTAL);
    Lazy::force(&REFUNDS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// HTTP metrics followed by the domain registry, Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = render_recorder_metrics();

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .ok();
    if let Ok(custom_metrics) = String::from_utf8(buffer) {
        output.push_str(&custom_metrics);
    }

    output
}

pub fn record_payment(provider: &str, outcome: &str) {
    PAYMENTS_TOTAL.with_label_values(&[provider, outcome]).inc();
}

pub fn record_webhook(provider: &str, outcome: &str) {
    WEBHOOKS_TOTAL.with_label_values(&[provider, outcome]).inc();
}

pub fn record_refund(provider: &str, outcome: &str) {
    REFUNDS_TOTAL.with_label_values(&[provider, outcome]).inc();
}
