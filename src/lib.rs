//! Route Dispatch Library
//!
//! An HTTP request-routing and plugin dispatch engine built on Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum fallback, TraceLayer)
//!                         │
//!                         ▼
//!                     http::dispatcher ──▶ routing (specificity-ordered table)
//!                         │
//!                         ├──▶ validation (params, query, payload, response)
//!                         ├──▶ cookies (decode, unseal)
//!                         ├──▶ plugins (request hooks, in order)
//!                         ├──▶ handler (exactly once)
//!                         ├──▶ plugins (response hooks, in order)
//!                         └──▶ events (:request, :response, :afterResponse, :error)
//!                         │
//!     Client Response     ▼
//!     ◀────────────── http::response / http::error
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod validation;

// Request extensions
pub mod cookies;
pub mod events;
pub mod plugins;

// Cross-cutting concerns
pub mod observability;

pub use config::AppConfig;
pub use events::{Event, EventBus, EventName};
pub use http::{App, DispatchError, HttpError, HttpServer, Reply, Request, Toolkit};
pub use plugins::Plugin;
pub use routing::RouteDefinition;
pub use validation::RouteValidation;
