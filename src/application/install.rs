//! Install handler: populate the worker's named cache from the asset list.

use std::{fmt, str::FromStr, time::Instant};

use futures::future::try_join_all;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    cache::{CacheKey, CacheStorage},
    domain::{FetchRequest, ResponseSnapshot, TransitionError},
};

use super::network::{Network, NetworkError};

pub const METRIC_INSTALL_ASSET_FAILED: &str = "precache_install_asset_failed_total";
pub const METRIC_INSTALL_MS: &str = "precache_install_ms";

/// What install does when a single asset cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
    /// All-or-nothing: every asset is fetched concurrently and committed in
    /// one write. Any failure fails the install and commits nothing.
    #[default]
    FailFast,
    /// Assets are fetched one after another; failures are logged and skipped,
    /// and the install always succeeds.
    BestEffort,
}

impl InstallPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for InstallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(Self::FailFast),
            "best-effort" => Ok(Self::BestEffort),
            other => Err(format!(
                "unknown install policy `{other}` (expected `fail-fast` or `best-effort`)"
            )),
        }
    }
}

/// Why one asset could not be precached.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("upstream answered with status {status}")]
    Status { status: u16 },
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to precache `{url}`: {source}")]
    Asset {
        url: String,
        #[source]
        source: AssetError,
    },
    #[error(transparent)]
    Lifecycle(#[from] TransitionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub url: String,
    pub reason: String,
}

/// Summary of one install run.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub cache_name: String,
    pub policy: InstallPolicy,
    pub cached: Vec<String>,
    pub failed: Vec<AssetFailure>,
}

impl InstallReport {
    fn new(cache_name: &str, policy: InstallPolicy) -> Self {
        Self {
            cache_name: cache_name.to_string(),
            policy,
            cached: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Open `cache_name` and fill it with `assets` according to `policy`.
pub async fn populate(
    storage: &CacheStorage,
    network: &dyn Network,
    cache_name: &str,
    assets: &[String],
    policy: InstallPolicy,
) -> Result<InstallReport, InstallError> {
    let started_at = Instant::now();
    info!(
        target = "precache::install",
        cache = %cache_name,
        policy = %policy,
        assets = assets.len(),
        "populating cache"
    );

    let result = match policy {
        InstallPolicy::FailFast => populate_all(storage, network, cache_name, assets).await,
        InstallPolicy::BestEffort => {
            Ok(populate_each(storage, network, cache_name, assets).await)
        }
    };

    histogram!(METRIC_INSTALL_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
    result
}

async fn populate_all(
    storage: &CacheStorage,
    network: &dyn Network,
    cache_name: &str,
    assets: &[String],
) -> Result<InstallReport, InstallError> {
    let cache = storage.open(cache_name);

    let fetches = assets.iter().map(move |url| async move {
        fetch_asset(network, url)
            .await
            .map_err(|source| InstallError::Asset {
                url: url.clone(),
                source,
            })
    });
    let batch = try_join_all(fetches).await.inspect_err(|err| {
        counter!(METRIC_INSTALL_ASSET_FAILED).increment(1);
        warn!(
            target = "precache::install",
            cache = %cache_name,
            error = %err,
            "aborting install, nothing committed"
        );
    })?;

    let mut report = InstallReport::new(cache_name, InstallPolicy::FailFast);
    report.cached = batch.iter().map(|(key, _)| key.to_string()).collect();
    cache.put_all(batch);

    info!(
        target = "precache::install",
        cache = %cache_name,
        cached = report.cached.len(),
        "cache populated"
    );
    Ok(report)
}

async fn populate_each(
    storage: &CacheStorage,
    network: &dyn Network,
    cache_name: &str,
    assets: &[String],
) -> InstallReport {
    let cache = storage.open(cache_name);
    let mut report = InstallReport::new(cache_name, InstallPolicy::BestEffort);

    for url in assets {
        match fetch_asset(network, url).await {
            Ok((key, response)) => {
                report.cached.push(key.to_string());
                cache.put(key, response);
            }
            Err(err) => {
                counter!(METRIC_INSTALL_ASSET_FAILED).increment(1);
                warn!(
                    target = "precache::install",
                    cache = %cache_name,
                    url = %url,
                    error = %err,
                    "failed to cache asset, continuing"
                );
                report.failed.push(AssetFailure {
                    url: url.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        target = "precache::install",
        cache = %cache_name,
        cached = report.cached.len(),
        failed = report.failed.len(),
        "cache populated"
    );
    report
}

async fn fetch_asset(
    network: &dyn Network,
    url: &str,
) -> Result<(CacheKey, ResponseSnapshot), AssetError> {
    let request = FetchRequest::get(url);
    let key = CacheKey::for_url(&request.url);
    let response = network.fetch(request).await?;

    if !response.ok() {
        return Err(AssetError::Status {
            status: response.status,
        });
    }

    Ok((key, response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_both_spellings() {
        assert_eq!("fail-fast".parse(), Ok(InstallPolicy::FailFast));
        assert_eq!("BEST_EFFORT".parse(), Ok(InstallPolicy::BestEffort));
        assert!("sometimes".parse::<InstallPolicy>().is_err());
    }

    #[test]
    fn policy_defaults_to_fail_fast() {
        assert_eq!(InstallPolicy::default(), InstallPolicy::FailFast);
    }

    #[test]
    fn policy_serializes_kebab_case() {
        let json = serde_json::to_string(&InstallPolicy::BestEffort).expect("serialize policy");
        assert_eq!(json, "\"best-effort\"");
    }

    #[test]
    fn asset_error_message_names_url() {
        let err = InstallError::Asset {
            url: "/logo.png".to_string(),
            source: AssetError::Status { status: 404 },
        };
        assert_eq!(
            err.to_string(),
            "failed to precache `/logo.png`: upstream answered with status 404"
        );
    }
}
