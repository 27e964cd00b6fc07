//! Handler results and response rendering.
//!
//! # Responsibilities
//! - Represent what a handler produced, including "nothing at all"
//! - Pick the final status from an explicit override or the body
//! - Serialize the body as JSON, or write no body at all
//!
//! # Design Decisions
//! - `Reply::Empty` is distinct from JSON `null` so the dispatcher can warn
//!   about handlers that forgot to produce a value
//! - Both `null` and `Empty` produce an empty body

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use serde::Serialize;
use serde_json::Value;

use crate::http::DispatchError;

/// What a handler returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    /// The handler produced no value.
    Empty,
}

impl Reply {
    /// Serialize any value into a reply.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        Ok(Reply::Value(serde_json::to_value(value)?))
    }

    pub fn null() -> Self {
        Reply::Value(Value::Null)
    }

    pub fn empty() -> Self {
        Reply::Empty
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }

    /// The body value. An empty reply reads as `null`.
    pub fn into_value(self) -> Value {
        match self {
            Reply::Value(value) => value,
            Reply::Empty => Value::Null,
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

/// Explicit status wins; otherwise 204 for an empty body, 200 for the rest.
pub fn select_status(explicit: Option<StatusCode>, body: &Value) -> StatusCode {
    match explicit {
        Some(status) => status,
        None if body.is_null() => StatusCode::NO_CONTENT,
        None => StatusCode::OK,
    }
}

/// Render a final body. `None` writes no body and no content type.
pub fn render(status: StatusCode, body: Option<&Value>) -> Response {
    let mut response = match body {
        Some(value) => match serde_json::to_vec(value) {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return response;
            }
        },
        None => Response::new(Body::empty()),
    };
    *response.status_mut() = status;
    response
}

/// `Some(body)` for anything writable, `None` for `null`.
pub fn writable(body: &Value) -> Option<&Value> {
    if body.is_null() {
        None
    } else {
        Some(body)
    }
}
