//! Inbound cookie decoding.

use std::collections::HashMap;

use axum::http::{header::COOKIE, HeaderMap};
use cookie::Cookie;

use crate::cookies::seal::{is_sealed, unseal};

/// Parse every `Cookie` header into a name → value map.
///
/// Names and values are percent-decoded, mirroring how `Toolkit` encodes
/// them on the way out.
/// Sealed values are unsealed with `secret` when one is configured. A value
/// that fails to unseal is kept as the raw sealed string; one bad cookie
/// never fails the request. The first occurrence of a name wins.
pub fn decode_cookies(headers: &HeaderMap, secret: Option<&str>) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            tracing::debug!("Skipping non-ASCII cookie header");
            continue;
        };

        for parsed in Cookie::split_parse_encoded(raw) {
            let Ok(cookie) = parsed else {
                continue;
            };
            if cookies.contains_key(cookie.name()) {
                continue;
            }
            let value = decode_value(cookie.name(), cookie.value(), secret);
            cookies.insert(cookie.name().to_string(), value);
        }
    }

    cookies
}

fn decode_value(name: &str, value: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if is_sealed(value) => match unseal(value, secret) {
            Ok(plain) => plain,
            Err(e) => {
                tracing::debug!(cookie = %name, error = %e, "Cookie failed to unseal, passing raw value");
                value.to_string()
            }
        },
        _ => value.to_string(),
    }
}
