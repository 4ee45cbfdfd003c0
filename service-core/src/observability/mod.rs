pub mod logging;
pub mod metrics;

pub use logging::{init_test_tracing, init_tracing};
pub use metrics::{init_metrics_recorder, render_recorder_metrics};
