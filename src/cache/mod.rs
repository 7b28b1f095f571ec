//! Named response caches.
//!
//! A [`CacheStorage`] holds any number of [`NamedCache`]s, each created lazily
//! on first [`CacheStorage::open`]. Entries map a request URL to a captured
//! [`ResponseSnapshot`](crate::domain::ResponseSnapshot).
//!
//! Matching follows the standard cache rules unless [`MatchOptions`] says
//! otherwise:
//!
//! - only `GET` requests match,
//! - the path and query must match exactly,
//! - fragments never take part in the key.

mod keys;
pub(crate) mod lock;
mod store;

pub use keys::{CacheKey, MatchOptions, lookup_key};
pub use store::{CacheStorage, NamedCache};
