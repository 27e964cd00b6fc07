//! Error taxonomy and the JSON error body.
//!
//! # Kinds
//! - `Validation`: caller sent bad params/query/payload → 400
//! - `ResponseValidation`: handler broke its own response schema → 500
//! - `Http`: deliberate status + name + message + optional body
//! - `Status`: a bare status code with no message
//! - `Cookie`: cookie sealing misconfiguration → 500
//! - `Other`: anything unclassified → 500 with the error's text
//!
//! Every kind renders to `{name, message}` plus `body` when there is one.

use std::fmt;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::cookies::SealError;
use crate::events::BoxError;
use crate::validation::ValidationError;

/// An error raised on purpose with an explicit status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: StatusCode,
    pub name: String,
    pub message: String,
    pub body: Option<Value>,
    allow: Vec<Method>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            name: "HttpError".to_string(),
            message: message.into(),
            body: None,
            allow: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message).with_name("NotFound")
    }

    pub fn method_not_allowed(allowed: Vec<Method>) -> Self {
        let mut err = Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").with_name("MethodNotAllowed");
        err.allow = allowed;
        err
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Request body exceeds {} bytes", limit),
        )
        .with_name("PayloadTooLarge")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message).with_name("InternalServerError")
    }

    /// Methods to advertise in an `Allow` header.
    pub fn allow(&self) -> &[Method] {
        &self.allow
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.status.as_u16(), self.message)
    }
}

impl std::error::Error for HttpError {}

/// Every way a dispatch can fail.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("handler violated its response schema: {0}")]
    ResponseValidation(ValidationError),

    #[error(transparent)]
    Http(#[from] HttpError),

    /// Bare 4xx/5xx status. Any other code is answered with a 500.
    #[error("request failed with status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Cookie(#[from] SealError),

    #[error("{0}")]
    Other(BoxError),
}

impl DispatchError {
    /// Wrap any unclassified error.
    pub fn other(err: impl Into<BoxError>) -> Self {
        DispatchError::Other(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
            DispatchError::Http(err) => error_status(err.status),
            DispatchError::Status(status) => error_status(*status),
            DispatchError::ResponseValidation(_) | DispatchError::Cookie(_) | DispatchError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// The JSON error body.
    pub fn body(&self) -> Value {
        match self {
            DispatchError::Validation(err) => json!({
                "name": "ValidationError",
                "message": err.to_string(),
                "body": err.details(),
            }),
            DispatchError::ResponseValidation(err) => json!({
                "name": "ResponseValidationError",
                "message": err.to_string(),
                "body": err.details(),
            }),
            DispatchError::Http(err) => {
                let mut body = json!({ "name": err.name, "message": err.message });
                if let Some(details) = &err.body {
                    body["body"] = details.clone();
                }
                body
            }
            DispatchError::Status(_) => json!({
                "name": "StatusError",
                "message": self.status().canonical_reason().unwrap_or("Unknown status"),
            }),
            DispatchError::Cookie(err) => json!({
                "name": "CookieError",
                "message": err.to_string(),
            }),
            DispatchError::Other(err) => json!({
                "name": "InternalServerError",
                "message": err.to_string(),
            }),
        }
    }

    /// Render as a complete response.
    pub fn to_response(&self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let DispatchError::Http(err) = self {
            if !err.allow.is_empty() {
                let allow = err.allow.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
            }
        }
        response
    }
}

// An error can never be answered with a success or redirect code.
fn error_status(status: StatusCode) -> StatusCode {
    if status.is_client_error() || status.is_server_error() {
        status
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<StatusCode> for DispatchError {
    fn from(status: StatusCode) -> Self {
        DispatchError::Status(status)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Other(Box::new(err))
    }
}
