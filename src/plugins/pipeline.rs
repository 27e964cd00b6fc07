//! Ordered execution of plugin hooks.
//!
//! Hooks are awaited one at a time in registration order. A later plugin may
//! rely on cookies, headers, or metadata produced by an earlier one, so this
//! loop must never be turned into a concurrent join.

use serde_json::Value;

use crate::http::{DispatchError, Request, Toolkit};
use crate::plugins::PluginRegistry;

/// Run every request hook and record returned metadata on `request`.
pub async fn run_request_hooks(
    registry: &PluginRegistry,
    request: &mut Request,
    toolkit: &Toolkit,
) -> Result<(), DispatchError> {
    for plugin in registry.iter() {
        let meta = plugin.run_request(request, toolkit).await?;
        match meta {
            Some(meta) => {
                request.plugins_mut().insert(plugin.name(), meta);
                tracing::trace!(request_id = %request.id(), plugin = plugin.name(), "Plugin attached metadata");
            }
            None => {
                tracing::trace!(request_id = %request.id(), plugin = plugin.name(), "Plugin request hook done");
            }
        }
    }
    Ok(())
}

/// Run every response hook with the final body. Stops at the first error.
pub async fn run_response_hooks(registry: &PluginRegistry, value: &Value) -> Result<(), DispatchError> {
    for plugin in registry.iter() {
        plugin.run_response(value).await.map_err(|e| {
            tracing::error!(plugin = plugin.name(), error = %e, "Plugin response hook failed");
            e
        })?;
    }
    Ok(())
}
