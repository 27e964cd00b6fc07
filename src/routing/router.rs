//! Route table construction and lookup.
//!
//! # Responsibilities
//! - Hold route definitions together with their computed specificity rank
//! - Keep routes in a total, deterministic match order
//! - Resolve `(method, path)` to a route, a method mismatch, or no match
//!
//! # Design Decisions
//! - Immutable after construction; adding a route builds a new table
//! - Ordering: segment scores descending, then path, then method
//! - First match in table order wins
//! - Trailing slash folding happens once, at registration and lookup

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;

use crate::http::{DispatchError, Reply, Request, Toolkit};
use crate::routing::pattern::PathPattern;
use crate::routing::RouteError;
use crate::validation::RouteValidation;

/// Future returned by a type-erased handler.
pub type HandlerFuture = BoxFuture<'static, Result<Reply, DispatchError>>;

/// A route handler.
///
/// Implemented for any async closure taking the request and toolkit and
/// returning a `Result` whose success converts into a [`Reply`].
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Arc<Request>, toolkit: Toolkit) -> HandlerFuture;
}

impl<F, Fut, R, E> Handler for F
where
    F: Fn(Arc<Request>, Toolkit) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Into<Reply>,
    E: Into<DispatchError>,
{
    fn call(&self, request: Arc<Request>, toolkit: Toolkit) -> HandlerFuture {
        let fut = (self)(request, toolkit);
        Box::pin(async move { fut.await.map(Into::into).map_err(Into::into) })
    }
}

/// A registered route. Never mutated after registration.
#[derive(Clone)]
pub struct RouteDefinition {
    pub method: Method,
    pub path: String,
    pub validation: RouteValidation,
    handler: Arc<dyn Handler>,
}

impl RouteDefinition {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            validation: RouteValidation::default(),
            handler: Arc::new(handler),
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, path, handler)
    }

    pub fn put(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PUT, path, handler)
    }

    pub fn patch(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PATCH, path, handler)
    }

    pub fn delete(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::DELETE, path, handler)
    }

    /// Attach input/output schemas.
    pub fn validate(mut self, validation: RouteValidation) -> Self {
        self.validation = validation;
        self
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

/// A route definition plus its compiled pattern and rank.
#[derive(Debug)]
pub struct ResolvedRoute {
    pub definition: RouteDefinition,
    pub pattern: PathPattern,
    pub rank: Vec<u8>,
}

impl ResolvedRoute {
    fn compile(definition: RouteDefinition, strict_trailing_slash: bool) -> Result<Self, RouteError> {
        let path = if strict_trailing_slash {
            definition.path.as_str()
        } else {
            fold_trailing_slash(&definition.path)
        };
        let pattern = PathPattern::parse(path)?;
        let rank = pattern.specificity();
        Ok(Self {
            definition,
            pattern,
            rank,
        })
    }

    pub fn method(&self) -> &Method {
        &self.definition.method
    }

    /// Total order used for matching: more specific first.
    pub fn precedence(&self, other: &Self) -> Ordering {
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| self.pattern.as_str().cmp(other.pattern.as_str()))
            .then_with(|| self.method().as_str().cmp(other.method().as_str()))
    }
}

/// Outcome of a route lookup.
#[derive(Debug)]
pub enum Resolution {
    Matched {
        route: Arc<ResolvedRoute>,
        params: Vec<(String, String)>,
    },
    /// The path matched at least one route, but none for this method.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Ordered, immutable set of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<ResolvedRoute>>,
    strict_trailing_slash: bool,
}

impl RouteTable {
    pub fn new(strict_trailing_slash: bool) -> Self {
        Self {
            routes: Vec::new(),
            strict_trailing_slash,
        }
    }

    /// Compile and order a full set of routes.
    pub fn build(
        definitions: impl IntoIterator<Item = RouteDefinition>,
        strict_trailing_slash: bool,
    ) -> Result<Self, RouteError> {
        let mut table = Self::new(strict_trailing_slash);
        for definition in definitions {
            table.insert(definition)?;
        }
        table.sort();
        Ok(table)
    }

    /// Copy of this table with one more route, re-sorted.
    pub fn with_route(&self, definition: RouteDefinition) -> Result<Self, RouteError> {
        let mut table = self.clone();
        table.insert(definition)?;
        table.sort();
        Ok(table)
    }

    fn insert(&mut self, definition: RouteDefinition) -> Result<(), RouteError> {
        let route = ResolvedRoute::compile(definition, self.strict_trailing_slash)?;
        let duplicate = self.routes.iter().any(|existing| {
            existing.method() == route.method() && existing.pattern.as_str() == route.pattern.as_str()
        });
        if duplicate {
            return Err(RouteError::Duplicate {
                method: route.method().to_string(),
                path: route.pattern.as_str().to_string(),
            });
        }
        self.routes.push(Arc::new(route));
        Ok(())
    }

    fn sort(&mut self) {
        self.routes.sort_by(|a, b| a.precedence(b));
    }

    /// Routes in match order.
    pub fn routes(&self) -> &[Arc<ResolvedRoute>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn strict_trailing_slash(&self) -> bool {
        self.strict_trailing_slash
    }

    /// Walk routes in order and pick the first whose method and pattern match.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let path = if self.strict_trailing_slash {
            path
        } else {
            fold_trailing_slash(path)
        };

        let mut allowed = Vec::new();
        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.method() == method {
                return Resolution::Matched {
                    route: route.clone(),
                    params,
                };
            }
            if !allowed.contains(route.method()) {
                allowed.push(route.method().clone());
            }
        }

        if allowed.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::MethodNotAllowed(allowed)
        }
    }
}

fn fold_trailing_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn noop(_request: Arc<Request>, _toolkit: Toolkit) -> Result<Value, DispatchError> {
        Ok(Value::Null)
    }

    fn order(table: &RouteTable) -> Vec<String> {
        table
            .routes()
            .iter()
            .map(|r| format!("{} {}", r.method(), r.pattern.as_str()))
            .collect()
    }

    fn matched_path(resolution: Resolution) -> String {
        match resolution {
            Resolution::Matched { route, .. } => route.pattern.as_str().to_string(),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_beats_param_regardless_of_registration_order() {
        for defs in [
            vec![
                RouteDefinition::get("/users/:id", noop),
                RouteDefinition::get("/users/active", noop),
            ],
            vec![
                RouteDefinition::get("/users/active", noop),
                RouteDefinition::get("/users/:id", noop),
            ],
        ] {
            let table = RouteTable::build(defs, false).unwrap();
            assert_eq!(matched_path(table.resolve(&Method::GET, "/users/active")), "/users/active");
            assert_eq!(matched_path(table.resolve(&Method::GET, "/users/7")), "/users/:id");
        }
    }

    #[test]
    fn test_order_is_total_and_idempotent() {
        let table = RouteTable::build(
            vec![
                RouteDefinition::get("/:a/:b", noop),
                RouteDefinition::post("/users/:id", noop),
                RouteDefinition::get("/users/:id", noop),
                RouteDefinition::get("/users/me", noop),
                RouteDefinition::get("/files/:name.json", noop),
                RouteDefinition::get("/files/:name", noop),
                RouteDefinition::get("/", noop),
            ],
            false,
        )
        .unwrap();

        let first = order(&table);
        assert_eq!(
            first,
            vec![
                "GET /users/me",
                "GET /files/:name.json",
                "GET /files/:name",
                "GET /users/:id",
                "POST /users/:id",
                "GET /:a/:b",
                "GET /",
            ]
        );

        let resorted = RouteTable::build(
            table.routes().iter().map(|r| r.definition.clone()),
            false,
        )
        .unwrap();
        assert_eq!(order(&resorted), first);

        for pair in table.routes().windows(2) {
            assert_eq!(pair[0].precedence(&pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let result = RouteTable::build(
            vec![
                RouteDefinition::get("/users/:id", noop),
                RouteDefinition::get("/users/:id/", noop),
            ],
            false,
        );
        assert!(matches!(result, Err(RouteError::Duplicate { .. })));

        let strict = RouteTable::build(
            vec![
                RouteDefinition::get("/users/:id", noop),
                RouteDefinition::get("/users/:id/", noop),
            ],
            true,
        );
        assert!(strict.is_ok());
    }

    #[test]
    fn test_method_not_allowed() {
        let table = RouteTable::build(
            vec![
                RouteDefinition::get("/items", noop),
                RouteDefinition::post("/items", noop),
            ],
            false,
        )
        .unwrap();

        match table.resolve(&Method::DELETE, "/items") {
            Resolution::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
        assert!(matches!(table.resolve(&Method::GET, "/nothing"), Resolution::NotFound));
    }

    #[test]
    fn test_trailing_slash_policy() {
        let relaxed = RouteTable::build(vec![RouteDefinition::get("/users", noop)], false).unwrap();
        assert!(matches!(relaxed.resolve(&Method::GET, "/users/"), Resolution::Matched { .. }));

        let strict = RouteTable::build(vec![RouteDefinition::get("/users", noop)], true).unwrap();
        assert!(matches!(strict.resolve(&Method::GET, "/users/"), Resolution::NotFound));
        assert!(matches!(strict.resolve(&Method::GET, "/users"), Resolution::Matched { .. }));
    }

    #[test]
    fn test_with_route_keeps_order() {
        let table = RouteTable::build(vec![RouteDefinition::get("/users/:id", noop)], false).unwrap();
        let table = table.with_route(RouteDefinition::get("/users/active", noop)).unwrap();
        assert_eq!(order(&table), vec!["GET /users/active", "GET /users/:id"]);
        assert!(table.with_route(RouteDefinition::get("/users/active", noop)).is_err());
    }
}
