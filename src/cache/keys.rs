//! Cache keys and lookup options.

use std::fmt;

use axum::http::Method;

use crate::domain::{FetchRequest, normalize_target};

/// Key of one cache entry: the URL of the request it answers, origin-relative
/// unless the request went to another origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_url(url: &str) -> Self {
        Self(normalize_target(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key with its query removed.
    pub fn without_search(&self) -> &str {
        match self.0.split_once('?') {
            Some((path, _)) => path,
            None => &self.0,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Knobs for cache lookups. The defaults give the standard matching rules:
/// only `GET` requests match, and the query is part of the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    pub ignore_search: bool,
    pub ignore_method: bool,
}

/// Key to look `request` up under, or `None` when its method can never match.
pub fn lookup_key(request: &FetchRequest, options: MatchOptions) -> Option<CacheKey> {
    if !options.ignore_method && request.method != Method::GET {
        return None;
    }
    Some(CacheKey::for_url(&request.url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_normalized_url() {
        assert_eq!(CacheKey::for_url("logo.png").as_str(), "/logo.png");
        assert_eq!(CacheKey::for_url("/a?b=1#c").as_str(), "/a?b=1");
    }

    #[test]
    fn without_search_drops_query() {
        assert_eq!(CacheKey::for_url("/a?b=1").without_search(), "/a");
        assert_eq!(CacheKey::for_url("/a").without_search(), "/a");
    }

    #[test]
    fn non_get_requests_have_no_key_by_default() {
        let post = FetchRequest::new(Method::POST, "/");
        assert!(lookup_key(&post, MatchOptions::default()).is_none());

        let head = FetchRequest::new(Method::HEAD, "/");
        assert!(lookup_key(&head, MatchOptions::default()).is_none());
    }

    #[test]
    fn ignore_method_admits_any_method() {
        let post = FetchRequest::new(Method::POST, "/logo.png");
        let options = MatchOptions {
            ignore_method: true,
            ..Default::default()
        };
        assert_eq!(
            lookup_key(&post, options),
            Some(CacheKey::for_url("/logo.png"))
        );
    }
}
