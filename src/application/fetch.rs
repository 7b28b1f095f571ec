//! Fetch handler: answer from cache first, fall through to the network.

use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    cache::{CacheStorage, MatchOptions},
    domain::{FetchRequest, ResponseSnapshot},
};

use super::network::{Network, NetworkError};

pub const METRIC_FETCH_CACHE_HIT: &str = "precache_fetch_cache_hit_total";
pub const METRIC_FETCH_NETWORK: &str = "precache_fetch_network_total";
pub const METRIC_FETCH_NETWORK_ERROR: &str = "precache_fetch_network_error_total";

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
}

impl FetchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub source: FetchSource,
    pub response: ResponseSnapshot,
}

/// The request missed the cache and the network produced no response.
#[derive(Debug, Error)]
#[error("network fetch for `{url}` failed: {source}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub source: NetworkError,
}

/// Resolve `request` against every cache in `storage`; on a miss forward it
/// to `network` unchanged. Nothing is written back to the cache.
pub async fn respond(
    storage: &CacheStorage,
    network: &dyn Network,
    request: FetchRequest,
) -> Result<FetchOutcome, FetchError> {
    if let Some(response) = storage.match_request(&request, MatchOptions::default()) {
        counter!(METRIC_FETCH_CACHE_HIT).increment(1);
        debug!(
            target = "precache::fetch",
            method = %request.method,
            url = %request.url,
            outcome = "hit",
            "serving cached response"
        );
        return Ok(FetchOutcome {
            source: FetchSource::Cache,
            response,
        });
    }

    debug!(
        target = "precache::fetch",
        method = %request.method,
        url = %request.url,
        outcome = "miss",
        "forwarding to network"
    );
    pass_through(network, request).await
}

/// Forward `request` to `network` without consulting any cache.
pub async fn pass_through(
    network: &dyn Network,
    request: FetchRequest,
) -> Result<FetchOutcome, FetchError> {
    counter!(METRIC_FETCH_NETWORK).increment(1);
    let url = request.url.clone();

    match network.fetch(request).await {
        Ok(response) => Ok(FetchOutcome {
            source: FetchSource::Network,
            response,
        }),
        Err(source) => {
            counter!(METRIC_FETCH_NETWORK_ERROR).increment(1);
            warn!(
                target = "precache::fetch",
                url = %url,
                error = %source,
                "network fetch failed"
            );
            Err(FetchError { url, source })
        }
    }
}
