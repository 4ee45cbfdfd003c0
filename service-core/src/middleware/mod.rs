pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod tracing;

pub use metrics::metrics_middleware;
pub use rate_limit::{route_rate_limit_middleware, RouteKey, RouteRateLimiter};
pub use security_headers::security_headers_middleware;
pub use tracing::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
