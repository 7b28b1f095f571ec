//! Intercepted request model.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use bytes::Bytes;
use url::Url;

/// A request issued by a controlled client, as seen by the fetch handler.
///
/// `url` is either origin-relative (a path with an optional query) or, for
/// requests to another origin, an absolute `http(s)` URL. It never carries a
/// fragment.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: normalize_target(url),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// True when the target names its own origin.
    pub fn is_absolute(&self) -> bool {
        !self.url.starts_with('/')
    }

    /// Path component of the target, without origin or query.
    pub fn path(&self) -> &str {
        let relative = self.origin_relative();
        match relative.split_once('?') {
            Some((path, _)) => path,
            None => relative,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.origin_relative()
            .split_once('?')
            .map(|(_, query)| query)
    }

    fn origin_relative(&self) -> &str {
        if !self.is_absolute() {
            return &self.url;
        }
        match self.url.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("/", |start| &rest[start..]),
            None => &self.url,
        }
    }
}

/// Canonical form of a request target.
///
/// Absolute `http(s)` URLs keep their origin, since a request to another
/// origin is a different request. Fragments are dropped and relative targets
/// get a leading slash.
pub fn normalize_target(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Ok(mut parsed) = Url::parse(trimmed)
        && matches!(parsed.scheme(), "http" | "https")
    {
        parsed.set_fragment(None);
        return parsed.into();
    }

    let without_fragment = match trimmed.split_once('#') {
        Some((head, _)) => head,
        None => trimmed,
    };

    if without_fragment.starts_with('/') {
        without_fragment.to_string()
    } else {
        format!("/{without_fragment}")
    }
}
