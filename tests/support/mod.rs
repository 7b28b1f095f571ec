#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{body::Body, http::Method};
use http_body_util::BodyExt;
use precache::{
    application::{Network, NetworkError, Registration, WorkerConfig},
    cache::CacheStorage,
    domain::{FetchRequest, ResponseSnapshot},
};

enum Reply {
    Respond(ResponseSnapshot),
    Fail,
}

/// In-memory network: scripted replies per URL, 404 for everything else.
///
/// Every fetch yields to the scheduler a few times while counted as in
/// flight, so overlapping fetches show up in `max_in_flight`.
#[derive(Default)]
pub struct StubNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(Method, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `/`, `/logo.png` and `/manifest.json`.
    pub fn with_shell_assets() -> Self {
        Self::new()
            .with_asset("/", "home")
            .with_asset("/logo.png", "png")
            .with_asset("/manifest.json", "{}")
    }

    pub fn with_asset(self, url: &str, body: &'static str) -> Self {
        let response = ResponseSnapshot::new(200).with_body(body);
        self.insert(url, Reply::Respond(response));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.insert(url, Reply::Respond(ResponseSnapshot::new(status)));
        self
    }

    pub fn failing(self, url: &str) -> Self {
        self.insert(url, Reply::Fail);
        self
    }

    /// Swap the reply for `url` after construction.
    pub fn set_asset(&self, url: &str, body: &'static str) {
        let response = ResponseSnapshot::new(200).with_body(body);
        self.insert(url, Reply::Respond(response));
    }

    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|(_, called)| called == url)
            .count()
    }

    /// Highest number of fetches that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn insert(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(url.to_string(), reply);
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: FetchRequest) -> Result<ResponseSnapshot, NetworkError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((request.method.clone(), request.url.clone()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        let reply = {
            let replies = self.replies.lock().expect("replies lock");
            match replies.get(&request.url) {
                Some(Reply::Respond(response)) => Ok(response.clone()),
                Some(Reply::Fail) => Err(NetworkError::transport(
                    request.url.clone(),
                    "connection refused",
                )),
                None => Ok(ResponseSnapshot::new(404).with_body("not found")),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

pub fn registration(network: &Arc<StubNetwork>) -> Registration {
    Registration::new(
        Arc::new(CacheStorage::new()),
        Arc::clone(network) as Arc<dyn Network>,
    )
}

pub fn config_with_assets(assets: &[&str]) -> WorkerConfig {
    WorkerConfig {
        assets: assets.iter().map(|asset| asset.to_string()).collect(),
        ..WorkerConfig::default()
    }
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.expect("collect body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
