//! Cross-site request forgery token lookup.
//!
//! The server sets a `csrftoken` cookie and may also render the token into a
//! `csrf-token` meta tag. The cookie wins; the meta value is the fallback.
//! The token is looked up on every request because the server may rotate
//! the cookie at any response.

use std::sync::Arc;

use reqwest::cookie::CookieStore;
use reqwest::cookie::Jar;
use url::Url;

use crate::config::CsrfConfig;

/// Form field name the server reads the token from.
pub const FORM_FIELD: &str = "csrfmiddlewaretoken";

/// Header name the server also accepts.
pub const HEADER: &str = "X-CSRFToken";

pub trait CsrfSource: Send + Sync {
    /// Token for a request to `url`, if one is available.
    fn token(&self, url: &Url) -> Option<String>;
}

/// Pull `name` out of a `Cookie:` style header (`a=1; csrftoken=xyz`).
pub fn token_from_cookie_header(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Reads the token from the client's cookie jar, falling back to the meta
/// tag value.
pub struct CookieOrMeta {
    jar: Arc<Jar>,
    cookie_name: String,
    meta_token: Option<String>,
}

impl CookieOrMeta {
    pub fn new(jar: Arc<Jar>, config: &CsrfConfig) -> Self {
        Self {
            jar,
            cookie_name: config.cookie_name.clone(),
            meta_token: config.meta_token.clone(),
        }
    }
}

impl CsrfSource for CookieOrMeta {
    fn token(&self, url: &Url) -> Option<String> {
        let from_cookie = self
            .jar
            .cookies(url)
            .and_then(|header| header.to_str().ok().map(str::to_string))
            .and_then(|header| token_from_cookie_header(&header, &self.cookie_name));
        from_cookie.or_else(|| self.meta_token.clone())
    }
}

/// Fixed token, for shells that already know it.
pub struct StaticToken(pub String);

impl CsrfSource for StaticToken {
    fn token(&self, _url: &Url) -> Option<String> {
        Some(self.0.clone())
    }
}
