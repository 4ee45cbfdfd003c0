//! Prometheus metrics for academic-service.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use service_core::observability::{init_metrics_recorder, render_recorder_metrics};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static TIMETABLE_ENTRIES_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "academic_timetable_entries_created_total",
        "Timetable entries persisted",
    )
    .expect("Failed to create academic_timetable_entries_created_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register academic_timetable_entries_created_total");
    counter
});

/// Rejected timetable proposals by clash kind (faculty, room).
pub static TIMETABLE_CONFLICTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "academic_timetable_conflicts_total",
            "Rejected timetable proposals by clash kind",
        ),
        &["kind"],
    )
    .expect("Failed to create academic_timetable_conflicts_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register academic_timetable_conflicts_total");
    counter
});

/// Mark submissions by outcome (recorded, rejected).
pub static MARKS_RECORDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("academic_marks_recorded_total", "Mark submissions by outcome"),
        &["outcome"],
    )
    .expect("Failed to create academic_marks_recorded_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register academic_marks_recorded_total");
    counter
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "academic_db_query_duration_seconds",
            "Database query duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"],
    )
    .expect("Failed to create academic_db_query_duration metric");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Failed to register academic_db_query_duration");
    histogram
});

/// Install the HTTP recorder and force registration of domain metrics.
pub fn init_metrics() {
    init_metrics_recorder();
    Lazy::force(&TIMETABLE_ENTRIES_CREATED);
    Lazy::force(&TIMETABLE_CONFLICTS_TOTAL);
    Lazy::force(&MARKS_RECORDED_TOTAL);
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

pub fn record_timetable_created() {
    TIMETABLE_ENTRIES_CREATED.inc();
}

pub fn record_conflict(kind: &str) {
    TIMETABLE_CONFLICTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_mark(outcome: &str) {
    MARKS_RECORDED_TOTAL.with_label_values(&[outcome]).inc();
}
