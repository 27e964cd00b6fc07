//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher produces:
//!     → logging.rs (structured log events with request_id)
//!     → metrics.rs (request counter and latency histogram)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a dispatch
//! - Metrics are cheap; with no recorder installed they are no-ops

pub mod logging;
pub mod metrics;
