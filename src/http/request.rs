//! Per-call request value.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Capture arrival time before any validation runs
//! - Carry validated params/query/payload, decoded cookies and plugin
//!   metadata to hooks and the handler
//!
//! # Design Decisions
//! - Request ID and timestamp taken as early as possible for tracing
//! - Built only after all input validation succeeded
//! - Plugin metadata is writable only inside the crate, during the request
//!   hook phase; handlers see a shared, immutable `Arc<Request>`

use std::collections::HashMap;
use std::fmt;
use std::time::{Instant, SystemTime};

use axum::http::{request::Parts, HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::plugins::{Plugin, PluginData};

/// Unique identifier of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity and timing captured the moment a request enters the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct Arrival {
    pub id: RequestId,
    pub timestamp: SystemTime,
    pub started: Instant,
}

impl Arrival {
    pub fn now() -> Self {
        Self {
            id: RequestId::new(),
            timestamp: SystemTime::now(),
            started: Instant::now(),
        }
    }
}

/// A validated request as seen by plugins and handlers.
#[derive(Debug)]
pub struct Request {
    id: RequestId,
    timestamp: SystemTime,
    path: String,
    params: Value,
    query: Value,
    payload: Value,
    cookies: HashMap<String, String>,
    plugins: PluginData,
    raw: Parts,
}

impl Request {
    pub(crate) fn new(
        arrival: &Arrival,
        raw: Parts,
        params: Value,
        query: Value,
        payload: Value,
        cookies: HashMap<String, String>,
    ) -> Self {
        Self {
            id: arrival.id,
            timestamp: arrival.timestamp,
            path: raw.uri.path().to_string(),
            params,
            query,
            payload,
            cookies,
            plugins: PluginData::default(),
            raw,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Arrival time.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn method(&self) -> &Method {
        &self.raw.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn query(&self) -> &Value {
        &self.query
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserialize validated params into a concrete type.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }

    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.query.clone())
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Decoded (unsealed where possible) cookies.
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn plugins(&self) -> &PluginData {
        &self.plugins
    }

    /// Metadata attached by plugin `P`.
    pub fn plugin<P: Plugin>(&self) -> Option<&P::Meta> {
        self.plugins.get::<P>()
    }

    pub(crate) fn plugins_mut(&mut self) -> &mut PluginData {
        &mut self.plugins
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.raw.headers
    }

    /// The underlying transport request head.
    pub fn raw(&self) -> &Parts {
        &self.raw
    }
}
