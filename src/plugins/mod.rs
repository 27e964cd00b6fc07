//! Plugin registry and per-request plugin metadata.
//!
//! # Data Flow
//! ```text
//! Setup:
//!     App::plugin(P) (registration order preserved)
//!     → PluginRegistry (duplicate names rejected)
//!
//! Per request:
//!     pipeline.rs request hooks, sequentially
//!     → metadata stored in Request::plugins under P::NAME
//!     → handler reads it back as P::Meta
//!     pipeline.rs response hooks, sequentially, after the body is final
//! ```
//!
//! # Design Decisions
//! - Each plugin declares its name and metadata type at compile time; lookup
//!   is typed through the plugin type, never through string keys
//! - Hooks default to no-ops, so a plugin only implements what it needs

pub mod pipeline;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::http::{DispatchError, Request, Toolkit};

/// An extension of the request pipeline.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Unique name; metadata is stored under it.
    const NAME: &'static str;

    /// Metadata this plugin attaches to each request.
    type Meta: Send + Sync + 'static;

    /// Runs before the handler. Returning `Some` attaches metadata.
    async fn request(
        &self,
        _request: &Request,
        _toolkit: &Toolkit,
    ) -> Result<Option<Self::Meta>, DispatchError> {
        Ok(None)
    }

    /// Runs after the response body is final. Return value is discarded;
    /// an error aborts the remaining response hooks.
    async fn response(&self, _value: &Value) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Type-erased plugin as stored in the registry.
#[async_trait]
pub(crate) trait ErasedPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_request(
        &self,
        request: &Request,
        toolkit: &Toolkit,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>, DispatchError>;

    async fn run_response(&self, value: &Value) -> Result<(), DispatchError>;
}

#[async_trait]
impl<P: Plugin> ErasedPlugin for P {
    fn name(&self) -> &'static str {
        P::NAME
    }

    async fn run_request(
        &self,
        request: &Request,
        toolkit: &Toolkit,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>, DispatchError> {
        let meta = Plugin::request(self, request, toolkit).await?;
        Ok(meta.map(|m| Box::new(m) as Box<dyn Any + Send + Sync>))
    }

    async fn run_response(&self, value: &Value) -> Result<(), DispatchError> {
        Plugin::response(self, value).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("plugin `{0}` is already registered")]
    Duplicate(&'static str),
}

/// Ordered set of plugins, built once at setup.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ErasedPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin. Invocation order is registration order.
    pub fn register<P: Plugin>(&mut self, plugin: P) -> Result<(), PluginError> {
        if self.contains(P::NAME) {
            return Err(PluginError::Duplicate(P::NAME));
        }
        self.plugins.push(Arc::new(plugin));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    /// Names in invocation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn ErasedPlugin>> {
        self.plugins.iter()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Metadata attached to one request by plugin request hooks.
#[derive(Default)]
pub struct PluginData {
    entries: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl PluginData {
    /// Typed access to the metadata plugin `P` attached, if any.
    pub fn get<P: Plugin>(&self) -> Option<&P::Meta> {
        self.entries.get(P::NAME)?.downcast_ref::<P::Meta>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store metadata for `name`; a name is only ever written once.
    pub(crate) fn insert(&mut self, name: &'static str, meta: Box<dyn Any + Send + Sync>) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name, meta);
        true
    }
}

impl fmt::Debug for PluginData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().copied().collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}
