//! Lifecycle event bus.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → emit(:request | :response | :afterResponse | :error)
//!     → snapshot of listeners for that name (taken at emit time)
//!     → each listener called in registration order, isolated
//! ```
//!
//! # Design Decisions
//! - Explicit service object, cloned into the dispatcher; no globals
//! - Listener list is copy-on-write behind `ArcSwap`, so `on`/`off` during an
//!   `emit` never disturbs the iteration in progress
//! - A failing or panicking listener is logged and skipped over

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use serde_json::Value;

use crate::http::{DispatchError, Request};

/// Boxed error returned by listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The fixed set of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Request,
    Response,
    AfterResponse,
    Error,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::Request => ":request",
            EventName::Response => ":response",
            EventName::AfterResponse => ":afterResponse",
            EventName::Error => ":error",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `:afterResponse`.
#[derive(Debug, Clone)]
pub struct AfterResponse {
    pub payload: Option<Value>,
    pub request: Arc<Request>,
    pub status_code: StatusCode,
    /// Taken after the response was written.
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone)]
pub enum Event {
    Request(Arc<Request>),
    /// Final body, `None` for an empty response.
    Response(Option<Value>),
    AfterResponse(AfterResponse),
    Error(Arc<DispatchError>),
}

impl Event {
    pub fn name(&self) -> EventName {
        match self {
            Event::Request(_) => EventName::Request,
            Event::Response(_) => EventName::Response,
            Event::AfterResponse(_) => EventName::AfterResponse,
            Event::Error(_) => EventName::Error,
        }
    }
}

type Listener = Arc<dyn Fn(&Event) -> Result<(), BoxError> + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerMap = HashMap<EventName, Vec<(ListenerId, Listener)>>;

struct Registry {
    listeners: ArcSwap<ListenerMap>,
    next_id: AtomicU64,
}

/// Process-scoped publish/subscribe channel. Cheap to clone; clones share
/// the same listener registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                listeners: ArcSwap::from_pointee(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener for `name`.
    pub fn on<F>(&self, name: EventName, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        self.inner.listeners.rcu(|current| {
            let mut next = ListenerMap::clone(current);
            next.entry(name).or_default().push((id, listener.clone()));
            next
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, name: EventName, id: ListenerId) -> bool {
        let mut removed = false;
        self.inner.listeners.rcu(|current| {
            let mut next = ListenerMap::clone(current);
            removed = false;
            if let Some(list) = next.get_mut(&name) {
                let before = list.len();
                list.retain(|(existing, _)| *existing != id);
                removed = list.len() != before;
            }
            next
        });
        removed
    }

    pub fn listener_count(&self, name: EventName) -> usize {
        self.inner
            .listeners
            .load()
            .get(&name)
            .map_or(0, Vec::len)
    }

    /// Call every listener registered for this event's name, in
    /// registration order. Returns how many listeners were invoked.
    pub fn emit(&self, event: &Event) -> usize {
        let name = event.name();
        let snapshot = self.inner.listeners.load_full();
        let Some(listeners) = snapshot.get(&name) else {
            return 0;
        };

        for (id, listener) in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = %name, listener = id.0, error = %e, "Event listener failed");
                }
                Err(_) => {
                    tracing::error!(event = %name, listener = id.0, "Event listener panicked");
                }
            }
        }
        listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.inner.listeners.load();
        let mut counts: Vec<(&'static str, usize)> = snapshot
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        counts.sort();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}
