use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        fetch::{METRIC_FETCH_CACHE_HIT, METRIC_FETCH_NETWORK, METRIC_FETCH_NETWORK_ERROR},
        install::{METRIC_INSTALL_ASSET_FAILED, METRIC_INSTALL_MS},
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_FETCH_CACHE_HIT,
            Unit::Count,
            "Total number of requests answered from a cache."
        );
        describe_counter!(
            METRIC_FETCH_NETWORK,
            Unit::Count,
            "Total number of requests forwarded to the network."
        );
        describe_counter!(
            METRIC_FETCH_NETWORK_ERROR,
            Unit::Count,
            "Total number of forwarded requests that produced no response."
        );
        describe_counter!(
            METRIC_INSTALL_ASSET_FAILED,
            Unit::Count,
            "Total number of assets that could not be precached."
        );
        describe_histogram!(
            METRIC_INSTALL_MS,
            Unit::Milliseconds,
            "Install handler latency in milliseconds."
        );
    });
}
