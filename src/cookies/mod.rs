//! Cookie subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     Cookie header(s)
//!     → jar.rs (parse pairs)
//!     → seal.rs (is_sealed? → unseal, fall back to raw on failure)
//!     → name → value map on the Request
//!
//! Outbound (via Toolkit):
//!     set_cookie(name, value, options)
//!     → options.rs (merge with app defaults)
//!     → seal.rs (when encrypted)
//!     → Set-Cookie header buffered until the response is finalized
//! ```
//!
//! # Design Decisions
//! - Sealed values carry a fixed prefix so classification needs no secret
//! - Secret length is checked at startup when encryption is on
//! - Decoding is best effort; encoding errors are configuration errors

pub mod jar;
pub mod options;
pub mod seal;

pub use jar::decode_cookies;
pub use options::{CookieOptions, SameSite};
pub use seal::{check_secret, is_sealed, seal, unseal, SealError, SEAL_PREFIX, SECRET_LEN};
