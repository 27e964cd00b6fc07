//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Collect routes and plugins at setup, reject bad ones before serving
//! - Create the axum Router that hands every request to the dispatcher
//! - Wire up middleware (tracing)
//! - Bind server to listener and publish the bound address
//!
//! # Design Decisions
//! - axum's own routing is unused; one fallback handler owns matching
//! - Startup errors (config, routes, plugins) are fatal and typed

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{validate_config, AppConfig, ConfigIssue};
use crate::events::EventBus;
use crate::http::{Dispatcher, ServerContext};
use crate::plugins::{Plugin, PluginError, PluginRegistry};
use crate::routing::{RouteDefinition, RouteError, RouteTable};

/// Fatal errors raised while assembling the app.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Config(Vec<ConfigIssue>),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Application builder.
pub struct App {
    config: AppConfig,
    events: EventBus,
    routes: Vec<RouteDefinition>,
    plugins: PluginRegistry,
    plugin_error: Option<PluginError>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            events: EventBus::new(),
            routes: Vec::new(),
            plugins: PluginRegistry::new(),
            plugin_error: None,
        }
    }

    /// The event bus handlers and listeners share. Subscribe before or
    /// after `build`; clones see the same listeners.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn route(mut self, definition: RouteDefinition) -> Self {
        self.routes.push(definition);
        self
    }

    /// Register a plugin. Hooks run in registration order.
    pub fn plugin<P: Plugin>(mut self, plugin: P) -> Self {
        if let Err(e) = self.plugins.register(plugin) {
            self.plugin_error.get_or_insert(e);
        }
        self
    }

    /// Validate everything and assemble the server.
    pub fn build(self) -> Result<HttpServer, StartupError> {
        validate_config(&self.config).map_err(StartupError::Config)?;
        if let Some(e) = self.plugin_error {
            return Err(e.into());
        }

        let table = RouteTable::build(self.routes, self.config.router.strict_trailing_slash)?;
        tracing::info!(
            routes = table.len(),
            plugins = ?self.plugins.names(),
            "Application assembled"
        );

        let context = ServerContext::new(self.events).with_plugins(self.plugins.names());
        let dispatcher = Arc::new(Dispatcher::new(
            table,
            self.plugins,
            context,
            self.config.cookies.clone(),
            self.config.limits.max_body_size,
        ));
        let router = build_router(dispatcher.clone());

        Ok(HttpServer {
            router,
            dispatcher,
            config: self.config,
        })
    }
}

/// Every request goes through the dispatcher.
fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(dispatch_handler)
        .with_state(dispatcher)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch_handler(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    dispatcher.handle(request).await
}

/// An assembled, ready-to-serve app.
pub struct HttpServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
    config: AppConfig,
}

impl HttpServer {
    /// The axum service, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        self.dispatcher.context().set_address(addr);
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieOptions;
    use crate::http::{DispatchError, Request as DispatchRequest, Toolkit};
    use async_trait::async_trait;
    use serde_json::Value;

    async fn noop(_request: Arc<DispatchRequest>, _toolkit: Toolkit) -> Result<Value, DispatchError> {
        Ok(Value::Null)
    }

    struct Named;

    #[async_trait]
    impl Plugin for Named {
        const NAME: &'static str = "named";
        type Meta = ();
    }

    #[test]
    fn test_build_rejects_bad_routes() {
        let result = App::new(AppConfig::default())
            .route(RouteDefinition::get("/files/:a:b", noop))
            .build();
        assert!(matches!(result, Err(StartupError::Route(RouteError::MultipleParams { .. }))));
    }

    #[test]
    fn test_build_rejects_duplicate_plugins() {
        let result = App::new(AppConfig::default()).plugin(Named).plugin(Named).build();
        assert!(matches!(result, Err(StartupError::Plugin(PluginError::Duplicate("named")))));

        let server = App::new(AppConfig::default()).plugin(Named).build().unwrap();
        assert_eq!(server.dispatcher().context().plugins(), &["named"]);
    }

    #[test]
    fn test_build_rejects_bad_cookie_secret() {
        let mut config = AppConfig::default();
        config.cookies = CookieOptions::new().encrypted(true).secret("short");
        let err = App::new(config).build().err().unwrap();
        assert!(matches!(err, StartupError::Config(_)));
        assert!(err.to_string().contains("cookies.secret"));
    }

    #[tokio::test]
    async fn test_serve_publishes_address() {
        let server = App::new(AppConfig::default())
            .route(RouteDefinition::get("/", noop))
            .build()
            .unwrap();
        let context = server.dispatcher().context().clone();
        assert!(context.address().is_none());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let expected = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            rx.await.ok();
        }));

        for _ in 0..50 {
            if context.address().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(context.address(), Some(expected));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
