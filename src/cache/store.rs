//! Named caches and the storage that owns them.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use tracing::debug;

use crate::domain::{FetchRequest, ResponseSnapshot};

use super::{
    keys::{CacheKey, MatchOptions, lookup_key},
    lock::{rw_read, rw_write},
};

const SOURCE: &str = "cache::store";

/// One named request → response store.
///
/// Entries are only ever added or overwritten; nothing in this crate removes
/// them.
pub struct NamedCache {
    name: String,
    entries: RwLock<BTreeMap<CacheKey, ResponseSnapshot>>,
}

impl NamedCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find the stored response for `request`.
    pub fn match_request(
        &self,
        request: &FetchRequest,
        options: MatchOptions,
    ) -> Option<ResponseSnapshot> {
        let key = lookup_key(request, options)?;
        let entries = rw_read(&self.entries, SOURCE, "match_request");

        if options.ignore_search {
            let wanted = key.without_search();
            return entries
                .iter()
                .find(|(candidate, _)| candidate.without_search() == wanted)
                .map(|(_, response)| response.clone());
        }

        entries.get(&key).cloned()
    }

    /// Store `response` under `key`, returning the response it replaced.
    pub fn put(&self, key: CacheKey, response: ResponseSnapshot) -> Option<ResponseSnapshot> {
        debug!(cache = %self.name, key = %key, "storing cache entry");
        rw_write(&self.entries, SOURCE, "put").insert(key, response)
    }

    /// Store every entry under a single write lock, so readers observe
    /// either none or all of them.
    pub fn put_all(&self, batch: Vec<(CacheKey, ResponseSnapshot)>) {
        let mut entries = rw_write(&self.entries, SOURCE, "put_all");
        for (key, response) in batch {
            entries.insert(key, response);
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains_key(key)
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        rw_read(&self.entries, SOURCE, "keys")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total body bytes held by this cache.
    pub fn size_bytes(&self) -> usize {
        rw_read(&self.entries, SOURCE, "size_bytes")
            .values()
            .map(ResponseSnapshot::size)
            .sum()
    }
}

/// The set of named caches available to workers, kept in creation order.
#[derive(Default)]
pub struct CacheStorage {
    caches: RwLock<Vec<Arc<NamedCache>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the cache called `name`, creating it on first use.
    pub fn open(&self, name: &str) -> Arc<NamedCache> {
        if let Some(existing) = find(&rw_read(&self.caches, SOURCE, "open.read"), name) {
            return existing;
        }

        let mut caches = rw_write(&self.caches, SOURCE, "open.write");
        // Another caller may have created it between the two locks.
        if let Some(existing) = find(&caches, name) {
            return existing;
        }
        debug!(cache = %name, "creating named cache");
        let created = Arc::new(NamedCache::new(name));
        caches.push(Arc::clone(&created));
        created
    }

    pub fn has(&self, name: &str) -> bool {
        find(&rw_read(&self.caches, SOURCE, "has"), name).is_some()
    }

    /// Names of every cache, oldest first.
    pub fn keys(&self) -> Vec<String> {
        rw_read(&self.caches, SOURCE, "keys")
            .iter()
            .map(|cache| cache.name().to_string())
            .collect()
    }

    /// Look `request` up in every cache, oldest first, returning the first hit.
    pub fn match_request(
        &self,
        request: &FetchRequest,
        options: MatchOptions,
    ) -> Option<ResponseSnapshot> {
        let caches = rw_read(&self.caches, SOURCE, "match_request").clone();

        caches
            .iter()
            .find_map(|cache| cache.match_request(request, options))
    }
}

fn find(caches: &[Arc<NamedCache>], name: &str) -> Option<Arc<NamedCache>> {
    caches
        .iter()
        .find(|cache| cache.name() == name)
        .map(Arc::clone)
}
