use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use route_dispatch::config::{load_config, AppConfig};
use route_dispatch::observability::{logging, metrics};
use route_dispatch::{App, DispatchError, Request, RouteDefinition, Toolkit};

#[derive(Parser)]
#[command(name = "route-dispatch")]
#[command(about = "HTTP routing and plugin dispatch server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn health(_request: Arc<Request>, _toolkit: Toolkit) -> Result<Value, DispatchError> {
    Ok(json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("route-dispatch v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        strict_trailing_slash = config.router.strict_trailing_slash,
        max_body_size = config.limits.max_body_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let server = App::new(config)
        .route(RouteDefinition::get("/health", health))
        .build()?;
    server.serve(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
