//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup or on hot swap):
//!     RouteDefinition[]
//!     → pattern.rs (parse, reject malformed segments)
//!     → router.rs (rank by segment specificity, total order)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (method, path)
//!     → router.rs (walk table in order)
//!     → pattern.rs (match segments, capture params)
//!     → Return: Matched | MethodNotAllowed | NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by specificity)

pub mod pattern;
pub mod router;

use thiserror::Error;

pub use pattern::{PathPattern, Segment};
pub use router::{Handler, HandlerFuture, Resolution, ResolvedRoute, RouteDefinition, RouteTable};

/// Malformed route registrations. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route path `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("route path `{path}`: segment `{segment}` declares more than one parameter")]
    MultipleParams { path: String, segment: String },

    #[error("route path `{path}`: segment `{segment}` has an empty parameter name")]
    EmptyParamName { path: String, segment: String },

    #[error("route path `{path}`: segment `{segment}` looks like a regular expression")]
    RegexSegment { path: String, segment: String },

    #[error("route path `{path}` declares parameter `{name}` twice")]
    DuplicateParam { path: String, name: String },

    #[error("route {method} {path} is already registered")]
    Duplicate { method: String, path: String },
}
