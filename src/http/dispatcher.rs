//! Per-request state machine.
//!
//! # Data Flow
//! ```text
//! Received
//!     → route resolution (404 / 405 go straight to the error path)
//!     → ParamsValidated → QueryValidated → PayloadValidated
//!     → CookiesDecoded
//!     → PluginsRanRequest (:request emitted)
//!     → HandlerInvoked (exactly once)
//!     → ResponseValidated
//!     → PluginsRanResponse
//!     → Finalized (:response, write, :afterResponse)
//!
//! Any error at any stage → fail() → :error → JSON error response
//! ```
//!
//! # Design Decisions
//! - Arrival identity and time are captured before anything else runs
//! - The route table is read through an `ArcSwap` snapshot, so a route
//!   registered mid-flight only affects later requests
//! - A single error path formats every failure kind and emits `:error`
//! - Once a response was handed over via `Toolkit::send_raw`, errors are
//!   logged and forwarded to `:error` but no error body is written

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request as HttpRequest};
use axum::response::Response;
use serde_json::Value;

use crate::cookies::{decode_cookies, CookieOptions};
use crate::events::{AfterResponse, Event, EventBus};
use crate::http::response::{render, select_status, writable};
use crate::http::{Arrival, DispatchError, HttpError, Request, ServerContext, Toolkit};
use crate::observability::metrics;
use crate::plugins::pipeline::{run_request_hooks, run_response_hooks};
use crate::plugins::PluginRegistry;
use crate::routing::{Resolution, ResolvedRoute, RouteDefinition, RouteError, RouteTable};
use crate::validation::{validate_record, validate_value, Issue, Slot, ValidationError};

/// Metrics label for requests that matched no route.
const UNMATCHED: &str = "none";

#[derive(Debug, Clone, Copy)]
enum Stage {
    Received,
    ParamsValidated,
    QueryValidated,
    PayloadValidated,
    CookiesDecoded,
    PluginsRanRequest,
    HandlerInvoked,
    ResponseValidated,
    PluginsRanResponse,
    Finalized,
}

fn enter(arrival: &Arrival, stage: Stage) {
    tracing::trace!(request_id = %arrival.id, stage = ?stage, "Dispatch stage");
}

/// Turns transport requests into handler calls and handler results into
/// transport responses.
pub struct Dispatcher {
    routes: ArcSwap<RouteTable>,
    write_lock: Mutex<()>,
    plugins: Arc<PluginRegistry>,
    context: ServerContext,
    cookies: Arc<CookieOptions>,
    max_body_size: usize,
}

impl Dispatcher {
    pub fn new(
        routes: RouteTable,
        plugins: PluginRegistry,
        context: ServerContext,
        cookies: CookieOptions,
        max_body_size: usize,
    ) -> Self {
        Self {
            routes: ArcSwap::from_pointee(routes),
            write_lock: Mutex::new(()),
            plugins: Arc::new(plugins),
            context,
            cookies: Arc::new(cookies),
            max_body_size,
        }
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    pub fn events(&self) -> &EventBus {
        self.context.events()
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Current route table snapshot.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    /// Add a route while serving. Builds a new sorted table and swaps it in.
    pub fn register(&self, definition: RouteDefinition) -> Result<(), RouteError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = self.routes.load().with_route(definition)?;
        tracing::info!(routes = next.len(), "Route table swapped");
        self.routes.store(Arc::new(next));
        Ok(())
    }

    /// Handle one request end to end. Never fails; every error becomes a
    /// response.
    pub async fn handle(&self, request: HttpRequest<Body>) -> Response {
        let arrival = Arrival::now();
        enter(&arrival, Stage::Received);

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let toolkit = Toolkit::new(self.cookies.clone(), self.context.clone());

        let table = self.routes.load_full();
        let (route, params) = match table.resolve(&method, &path) {
            Resolution::Matched { route, params } => (route, params),
            Resolution::NotFound => {
                let err = HttpError::not_found(format!("No route for {} {}", method, path));
                return self.fail(&arrival, &method, &path, UNMATCHED, &toolkit, err.into());
            }
            Resolution::MethodNotAllowed(allowed) => {
                let err = HttpError::method_not_allowed(allowed);
                return self.fail(&arrival, &method, &path, UNMATCHED, &toolkit, err.into());
            }
        };

        tracing::debug!(
            request_id = %arrival.id,
            method = %method,
            path = %path,
            route = %route.pattern.as_str(),
            "Route matched"
        );

        match self.process(&arrival, &route, params, request, &toolkit).await {
            Ok(response) => {
                let status = response.status();
                tracing::info!(
                    request_id = %arrival.id,
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    latency_ms = arrival.started.elapsed().as_millis() as u64,
                    "Request completed"
                );
                metrics::record_request(method.as_str(), status.as_u16(), route.pattern.as_str(), arrival.started);
                response
            }
            Err(err) => self.fail(&arrival, &method, &path, route.pattern.as_str(), &toolkit, err),
        }
    }

    async fn process(
        &self,
        arrival: &Arrival,
        route: &ResolvedRoute,
        params: Vec<(String, String)>,
        request: HttpRequest<Body>,
        toolkit: &Toolkit,
    ) -> Result<Response, DispatchError> {
        let validation = &route.definition.validation;

        let params = validate_record(validation.params.as_deref(), Slot::Params, &params).await?;
        enter(arrival, Stage::ParamsValidated);

        let query = parse_query(request.uri().query())?;
        let query = validate_record(validation.query.as_deref(), Slot::Query, &query).await?;
        enter(arrival, Stage::QueryValidated);

        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|_| HttpError::payload_too_large(self.max_body_size))?;
        let payload = validate_value(validation.payload.as_deref(), Slot::Payload, decode_payload(&bytes)?).await?;
        enter(arrival, Stage::PayloadValidated);

        let cookies = decode_cookies(&parts.headers, self.cookies.secret.as_deref());
        enter(arrival, Stage::CookiesDecoded);

        let mut request = Request::new(arrival, parts, params, query, payload, cookies);
        run_request_hooks(&self.plugins, &mut request, toolkit).await?;
        enter(arrival, Stage::PluginsRanRequest);

        let request = Arc::new(request);
        self.events().emit(&Event::Request(request.clone()));

        let reply = route.definition.handler().call(request.clone(), toolkit.clone()).await?;
        enter(arrival, Stage::HandlerInvoked);

        if reply.is_empty() {
            tracing::warn!(
                request_id = %arrival.id,
                route = %route.pattern.as_str(),
                "Handler produced no value, responding as null"
            );
        }
        let body = validate_value(validation.response.as_deref(), Slot::Response, reply.into_value())
            .await
            .map_err(DispatchError::ResponseValidation)?;
        enter(arrival, Stage::ResponseValidated);

        run_response_hooks(&self.plugins, &body).await?;
        enter(arrival, Stage::PluginsRanResponse);

        if let Some(raw) = toolkit.take_raw() {
            tracing::debug!(request_id = %arrival.id, "Response already sent, skipping write");
            self.after_response(request, None, &raw);
            enter(arrival, Stage::Finalized);
            return Ok(raw);
        }

        let status = select_status(toolkit.status(), &body);
        let written = writable(&body).cloned();
        self.events().emit(&Event::Response(written.clone()));

        let mut response = render(status, written.as_ref());
        toolkit.apply(&mut response);
        self.after_response(request, written, &response);
        enter(arrival, Stage::Finalized);
        Ok(response)
    }

    fn after_response(&self, request: Arc<Request>, payload: Option<Value>, response: &Response) {
        self.events().emit(&Event::AfterResponse(AfterResponse {
            payload,
            request,
            status_code: response.status(),
            timestamp: SystemTime::now(),
        }));
    }

    /// The single error path.
    fn fail(
        &self,
        arrival: &Arrival,
        method: &Method,
        path: &str,
        route: &str,
        toolkit: &Toolkit,
        err: DispatchError,
    ) -> Response {
        let status = err.status();
        if toolkit.is_sent() {
            tracing::error!(
                request_id = %arrival.id,
                method = %method,
                path = %path,
                error = %err,
                "Error after response was sent"
            );
        } else if status.is_server_error() {
            tracing::error!(
                request_id = %arrival.id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                error = %err,
                "Request failed"
            );
        } else {
            tracing::warn!(
                request_id = %arrival.id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                error = %err,
                "Request rejected"
            );
        }

        let err = Arc::new(err);
        self.events().emit(&Event::Error(err.clone()));

        let response = match toolkit.take_raw() {
            Some(raw) => raw,
            None => {
                let mut response = err.to_response();
                toolkit.apply(&mut response);
                response
            }
        };
        metrics::record_request(method.as_str(), response.status().as_u16(), route, arrival.started);
        response
    }
}

/// Decode a query string into an ordered record.
fn parse_query(query: Option<&str>) -> Result<Vec<(String, String)>, ValidationError> {
    match query {
        None | Some("") => Ok(Vec::new()),
        Some(query) => serde_urlencoded::from_str(query).map_err(|e| {
            ValidationError::new(Slot::Query, vec![Issue::root(format!("malformed query string: {}", e))])
        }),
    }
}

/// Empty body reads as `null`; anything else must be JSON.
fn decode_payload(bytes: &Bytes) -> Result<Value, ValidationError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        ValidationError::new(Slot::Payload, vec![Issue::root(format!("invalid JSON: {}", e))])
    })
}
