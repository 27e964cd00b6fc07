//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status, route
//! - `dispatch_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recorded once per request, at finalization, on success and failure
//! - Route label is the route pattern, never the concrete path, to keep
//!   cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "dispatch_requests_total";
pub const REQUEST_DURATION: &str = "dispatch_request_duration_seconds";

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}
