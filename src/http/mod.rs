//! HTTP dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum fallback handler, TraceLayer)
//!     → dispatcher.rs (resolve, validate, plugins, handler)
//!     → request.rs (validated Request, request ID)
//!     → toolkit.rs (buffered status, headers, cookies)
//!     → response.rs (status selection, JSON body)
//!     → error.rs (single error path on any failure)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod error;
pub mod request;
pub mod response;
pub mod server;
pub mod toolkit;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, HttpError};
pub use request::{Arrival, Request, RequestId};
pub use response::Reply;
pub use server::{App, HttpServer, StartupError};
pub use toolkit::{ServerContext, Toolkit};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::{Arrival, Request, ServerContext, Toolkit};
    use crate::cookies::CookieOptions;

    /// A bare GET request for `path` with empty inputs.
    pub(crate) fn request_for(path: &str) -> Request {
        let (parts, ()) = axum::http::Request::builder()
            .uri(path)
            .body(())
            .unwrap()
            .into_parts();
        Request::new(&Arrival::now(), parts, json!({}), json!({}), Value::Null, HashMap::new())
    }

    pub(crate) fn toolkit() -> Toolkit {
        Toolkit::new(Arc::new(CookieOptions::default()), ServerContext::default())
    }
}
