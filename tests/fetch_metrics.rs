mod support;

use std::{collections::HashMap, sync::Arc};

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use precache::{
    application::{
        InstallPolicy, WorkerConfig,
        fetch::{METRIC_FETCH_CACHE_HIT, METRIC_FETCH_NETWORK, METRIC_FETCH_NETWORK_ERROR},
        install::{METRIC_INSTALL_ASSET_FAILED, METRIC_INSTALL_MS},
    },
    domain::FetchRequest,
};

use support::{StubNetwork, registration};

#[tokio::test]
async fn worker_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let network = Arc::new(
        StubNetwork::with_shell_assets()
            .failing("/logo.png")
            .failing("/offline"),
    );
    let registration = registration(&network);
    registration
        .register(WorkerConfig {
            install_policy: InstallPolicy::BestEffort,
            ..WorkerConfig::default()
        })
        .await
        .expect("best-effort install succeeds");

    for _ in 0..2 {
        registration
            .handle_fetch(FetchRequest::get("/"))
            .await
            .expect("cache hit");
    }
    registration
        .handle_fetch(FetchRequest::get("/api"))
        .await
        .expect("network response");
    registration
        .handle_fetch(FetchRequest::get("/offline"))
        .await
        .expect_err("network failure");

    let metrics: HashMap<String, DebugValue> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| (composite_key.key().name().to_string(), value))
        .collect();

    let counter = |name: &str| match metrics.get(name) {
        Some(DebugValue::Counter(value)) => *value,
        other => panic!("expected counter {name}, found {other:?}"),
    };

    assert_eq!(counter(METRIC_FETCH_CACHE_HIT), 2);
    assert_eq!(counter(METRIC_FETCH_NETWORK), 2);
    assert_eq!(counter(METRIC_FETCH_NETWORK_ERROR), 1);
    assert_eq!(counter(METRIC_INSTALL_ASSET_FAILED), 1);
    assert!(
        matches!(metrics.get(METRIC_INSTALL_MS), Some(DebugValue::Histogram(samples)) if samples.len() == 1),
        "missing metric: {METRIC_INSTALL_MS}"
    );
}
