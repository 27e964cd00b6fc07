//! Validation adapter.
//!
//! # Data Flow
//! ```text
//! path params  ─┐
//! query string ─┼─→ validate_record (string record, coercible)  ─→ Value | ValidationError
//!               │
//! payload      ─┼─→ validate_value  (decoded JSON)              ─→ Value | ValidationError
//! handler reply ┘
//! ```
//!
//! # Design Decisions
//! - The schema engine sits behind the `Schema` trait; `Shape` and
//!   `TypedSchema` are the built-in implementations
//! - A missing schema passes the raw value through unchanged
//! - The slot a failure came from travels with the error so the dispatcher
//!   can tell caller faults (input slots) from handler faults (response)

pub mod shape;
pub mod typed;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

pub use shape::{FieldKind, Shape, UnknownFields};
pub use typed::TypedSchema;

/// Which part of the exchange was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Params,
    Query,
    Payload,
    Response,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Params => "params",
            Slot::Query => "query",
            Slot::Payload => "payload",
            Slot::Response => "response",
        })
    }
}

/// One failed check, located by field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: Vec<String>,
    pub message: String,
}

impl Issue {
    /// An issue about the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: vec![name.into()],
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

/// Structured validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub slot: Slot,
    pub issues: Vec<Issue>,
}

impl ValidationError {
    pub fn new(slot: Slot, issues: Vec<Issue>) -> Self {
        Self { slot, issues }
    }

    /// Details embedded in the error response body.
    pub fn details(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}", self.slot)?;
        for (i, issue) in self.issues.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A schema: turns an untrusted value into a validated one.
#[async_trait]
pub trait Schema: Send + Sync {
    async fn validate(&self, value: Value) -> Result<Value, Vec<Issue>>;

    /// Validate a string record (path params, query). Schemas that know
    /// field types override this to coerce scalars.
    async fn validate_record(&self, record: &[(String, String)]) -> Result<Value, Vec<Issue>> {
        self.validate(record_to_value(record)).await
    }
}

/// Per-route schemas. Every slot is optional.
#[derive(Clone, Default)]
pub struct RouteValidation {
    pub params: Option<Arc<dyn Schema>>,
    pub query: Option<Arc<dyn Schema>>,
    pub payload: Option<Arc<dyn Schema>>,
    pub response: Option<Arc<dyn Schema>>,
}

impl RouteValidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, schema: impl Schema + 'static) -> Self {
        self.params = Some(Arc::new(schema));
        self
    }

    pub fn query(mut self, schema: impl Schema + 'static) -> Self {
        self.query = Some(Arc::new(schema));
        self
    }

    pub fn payload(mut self, schema: impl Schema + 'static) -> Self {
        self.payload = Some(Arc::new(schema));
        self
    }

    pub fn response(mut self, schema: impl Schema + 'static) -> Self {
        self.response = Some(Arc::new(schema));
        self
    }
}

impl fmt::Debug for RouteValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteValidation")
            .field("params", &self.params.is_some())
            .field("query", &self.query.is_some())
            .field("payload", &self.payload.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

/// Build a JSON object from a string record. Repeated keys collect into an
/// array in order of appearance.
pub fn record_to_value(record: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (key, value) in record {
        match map.get_mut(key) {
            Some(Value::Array(values)) => values.push(Value::String(value.clone())),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value.clone())]);
            }
            None => {
                map.insert(key.clone(), Value::String(value.clone()));
            }
        }
    }
    Value::Object(map)
}

/// Validate a string record against an optional schema.
pub async fn validate_record(
    schema: Option<&dyn Schema>,
    slot: Slot,
    record: &[(String, String)],
) -> Result<Value, ValidationError> {
    match schema {
        Some(schema) => schema
            .validate_record(record)
            .await
            .map_err(|issues| ValidationError::new(slot, issues)),
        None => Ok(record_to_value(record)),
    }
}

/// Validate a decoded value against an optional schema.
pub async fn validate_value(
    schema: Option<&dyn Schema>,
    slot: Slot,
    value: Value,
) -> Result<Value, ValidationError> {
    match schema {
        Some(schema) => schema
            .validate(value)
            .await
            .map_err(|issues| ValidationError::new(slot, issues)),
        None => Ok(value),
    }
}
