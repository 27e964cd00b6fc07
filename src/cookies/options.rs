//! Cookie options and `Set-Cookie` rendering.

use cookie::{time::Duration, Cookie};
use serde::{Deserialize, Serialize};

/// `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl From<SameSite> for cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::None => cookie::SameSite::None,
        }
    }
}

/// Cookie options. Unset fields inherit from the app-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieOptions {
    /// Seal the value before sending it.
    pub encrypted: Option<bool>,

    /// Sealing secret, exactly 32 characters.
    pub secret: Option<String>,

    pub path: Option<String>,

    pub domain: Option<String>,

    /// Lifetime in seconds.
    pub max_age: Option<i64>,

    pub same_site: Option<SameSite>,

    pub http_only: Option<bool>,

    pub secure: Option<bool>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = Some(encrypted);
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Field-by-field merge; anything set in `overrides` wins.
    pub fn merge(&self, overrides: &CookieOptions) -> CookieOptions {
        CookieOptions {
            encrypted: overrides.encrypted.or(self.encrypted),
            secret: overrides.secret.clone().or_else(|| self.secret.clone()),
            path: overrides.path.clone().or_else(|| self.path.clone()),
            domain: overrides.domain.clone().or_else(|| self.domain.clone()),
            max_age: overrides.max_age.or(self.max_age),
            same_site: overrides.same_site.or(self.same_site),
            http_only: overrides.http_only.or(self.http_only),
            secure: overrides.secure.or(self.secure),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted.unwrap_or(false)
    }

    /// Build the cookie to send for `name=value` under these options.
    pub fn to_cookie(&self, name: &str, value: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()));
        if let Some(path) = &self.path {
            builder = builder.path(path.clone());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(seconds) = self.max_age {
            builder = builder.max_age(Duration::seconds(seconds));
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site.into());
        }
        if let Some(http_only) = self.http_only {
            builder = builder.http_only(http_only);
        }
        if let Some(secure) = self.secure {
            builder = builder.secure(secure);
        }
        builder.build()
    }

    /// Build an expiring cookie that clears `name` on the client.
    pub fn to_removal(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.to_cookie(name, "");
        cookie.make_removal();
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_overrides() {
        let defaults = CookieOptions::new()
            .path("/")
            .http_only(true)
            .encrypted(true)
            .secret("0123456789abcdef0123456789abcdef");
        let overrides = CookieOptions::new().path("/app").encrypted(false);

        let merged = defaults.merge(&overrides);
        assert_eq!(merged.path.as_deref(), Some("/app"));
        assert_eq!(merged.http_only, Some(true));
        assert!(!merged.is_encrypted());
        assert_eq!(merged.secret, defaults.secret);
    }

    #[test]
    fn test_render_set_cookie() {
        let options = CookieOptions::new()
            .path("/")
            .max_age(60)
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(true);
        let rendered = options.to_cookie("sid", "abc").to_string();

        assert!(rendered.starts_with("sid=abc"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=60"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
    }

    #[test]
    fn test_removal_expires_cookie() {
        let rendered = CookieOptions::new().path("/").to_removal("sid").to_string();
        assert!(rendered.starts_with("sid="));
        assert!(rendered.contains("Max-Age=0"));
        assert!(rendered.contains("Path=/"));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let options: CookieOptions = toml::from_str(
            r#"
            encrypted = true
            secret = "0123456789abcdef0123456789abcdef"
            same_site = "strict"
            "#,
        )
        .unwrap();
        assert!(options.is_encrypted());
        assert_eq!(options.same_site, Some(SameSite::Strict));
        assert_eq!(options.path, None);
    }
}
