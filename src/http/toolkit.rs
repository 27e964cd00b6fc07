//! Per-request capability object.
//!
//! # Responsibilities
//! - Buffer status, header and cookie effects requested by hooks/handlers
//! - Seal cookie values when the effective options ask for encryption
//! - Offer a side channel to hand over a complete transport response
//! - Expose the narrow server context (event bus, bound address)
//!
//! # Design Decisions
//! - Nothing is written until the dispatcher finalizes the response
//! - Cloneable handle over shared state so handlers can move it into
//!   async blocks

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use cookie::Cookie;

use crate::cookies::{seal, CookieOptions, SealError};
use crate::events::EventBus;
use crate::http::{DispatchError, HttpError};

/// What handlers may know about the running server.
#[derive(Debug, Clone)]
pub struct ServerContext {
    events: EventBus,
    plugins: Arc<[&'static str]>,
    local_addr: Arc<OnceLock<SocketAddr>>,
}

impl ServerContext {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            plugins: Arc::from(Vec::new()),
            local_addr: Arc::new(OnceLock::new()),
        }
    }

    /// Record the registered plugin names, in invocation order.
    pub fn with_plugins(mut self, names: Vec<&'static str>) -> Self {
        self.plugins = Arc::from(names);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Names of registered plugins; per-request metadata is read through
    /// `Request::plugin`.
    pub fn plugins(&self) -> &[&'static str] {
        &self.plugins
    }

    /// Bound listener address, once serving.
    pub fn address(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub(crate) fn set_address(&self, addr: SocketAddr) {
        if self.local_addr.set(addr).is_err() {
            tracing::debug!(address = %addr, "Server address already published");
        }
    }
}

impl Default for ServerContext {
    fn default() -> Self {
        Self::new(EventBus::new())
    }
}

#[derive(Default)]
struct Effects {
    status: Option<StatusCode>,
    headers: HeaderMap,
    cookies: Vec<Cookie<'static>>,
    raw: Option<Response>,
    sent: bool,
}

/// Buffered response effects for one request.
#[derive(Clone)]
pub struct Toolkit {
    effects: Arc<Mutex<Effects>>,
    cookie_defaults: Arc<CookieOptions>,
    context: ServerContext,
}

impl Toolkit {
    pub fn new(cookie_defaults: Arc<CookieOptions>, context: ServerContext) -> Self {
        Self {
            effects: Arc::new(Mutex::new(Effects::default())),
            cookie_defaults,
            context,
        }
    }

    fn effects(&self) -> MutexGuard<'_, Effects> {
        self.effects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a `Set-Cookie`. `options` override the app defaults field by
    /// field; the value is sealed when the merged options are encrypted.
    pub fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) -> Result<(), DispatchError> {
        let merged = self.cookie_defaults.merge(options);
        let cookie = if merged.is_encrypted() {
            let secret = merged.secret.as_deref().ok_or(SealError::MissingSecret)?;
            merged.to_cookie(name, &seal(value, secret)?)
        } else {
            merged.to_cookie(name, value)
        };
        self.effects().cookies.push(cookie);
        Ok(())
    }

    /// Queue an expiring cookie that clears `name`.
    pub fn remove_cookie(&self, name: &str, options: &CookieOptions) {
        let merged = self.cookie_defaults.merge(options);
        self.effects().cookies.push(merged.to_removal(name));
    }

    /// Explicit status; wins over the status derived from the body.
    pub fn set_status(&self, status: StatusCode) {
        self.effects().status = Some(status);
    }

    pub fn set_header(&self, name: &str, value: &str) -> Result<(), DispatchError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::internal(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::internal(format!("invalid header value: {}", e)))?;
        self.effects().headers.insert(name, value);
        Ok(())
    }

    /// Hand over a complete response. The dispatcher will not write its own.
    pub fn send_raw(&self, response: Response) {
        let mut effects = self.effects();
        effects.raw = Some(response);
        effects.sent = true;
    }

    /// Whether a response was already handed over through [`send_raw`].
    ///
    /// [`send_raw`]: Toolkit::send_raw
    pub fn is_sent(&self) -> bool {
        self.effects().sent
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    pub fn events(&self) -> &EventBus {
        self.context.events()
    }

    pub(crate) fn status(&self) -> Option<StatusCode> {
        self.effects().status
    }

    pub(crate) fn take_raw(&self) -> Option<Response> {
        self.effects().raw.take()
    }

    /// Apply buffered headers and cookies to the outgoing response.
    pub(crate) fn apply(&self, response: &mut Response) {
        let effects = self.effects();
        let headers = response.headers_mut();
        for (name, value) in &effects.headers {
            headers.insert(name.clone(), value.clone());
        }
        // Values are percent-encoded so they cannot smuggle attributes.
        for cookie in &effects.cookies {
            match HeaderValue::from_str(&cookie.encoded().to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name(), error = %e, "Dropping unencodable cookie");
                }
            }
        }
    }
}
