//! A single worker version and its lifecycle.

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use tracing::info;

use crate::{
    cache::{
        CacheStorage,
        lock::{rw_read, rw_write},
    },
    config::WorkerSettings,
    domain::{FetchRequest, TransitionError, WorkerId, WorkerState},
};

use super::{
    fetch::{self, FetchError, FetchOutcome},
    install::{self, InstallError, InstallPolicy, InstallReport},
    network::Network,
};

const SOURCE: &str = "application::worker";

pub const DEFAULT_CACHE_NAME: &str = "v1";
pub const DEFAULT_ASSETS: [&str; 3] = ["/", "/logo.png", "/manifest.json"];

/// What a worker version precaches and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub cache_name: String,
    pub assets: Vec<String>,
    pub install_policy: InstallPolicy,
    /// Activate as soon as install succeeds instead of waiting for an
    /// explicit activation.
    pub skip_waiting: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|asset| asset.to_string()).collect(),
            install_policy: InstallPolicy::default(),
            skip_waiting: true,
        }
    }
}

impl From<&WorkerSettings> for WorkerConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            cache_name: settings.cache_name.clone(),
            assets: settings.assets.clone(),
            install_policy: settings.install_policy,
            skip_waiting: settings.skip_waiting,
        }
    }
}

pub struct ServiceWorker {
    id: WorkerId,
    config: WorkerConfig,
    state: RwLock<WorkerState>,
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ServiceWorker {
    pub fn new(config: WorkerConfig, storage: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            id: WorkerId::new(),
            config,
            state: RwLock::new(WorkerState::Parsed),
            storage,
            network,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *rw_read(&self.state, SOURCE, "state")
    }

    pub fn is_active(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    pub fn is_waiting(&self) -> bool {
        self.state() == WorkerState::Installed
    }

    /// Run the install handler. On success the worker is `Installed`, or
    /// `Activated` when `skip_waiting` is set. On failure it is `Redundant`.
    pub async fn install(&self) -> Result<InstallReport, InstallError> {
        self.transition(WorkerState::Installing)?;

        let outcome = install::populate(
            &self.storage,
            self.network.as_ref(),
            &self.config.cache_name,
            &self.config.assets,
            self.config.install_policy,
        )
        .await;

        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                self.mark_redundant();
                return Err(err);
            }
        };

        self.transition(WorkerState::Installed)?;
        if self.config.skip_waiting {
            self.activate()?;
        }

        Ok(report)
    }

    /// Move an installed worker to `Activated`. Older cache versions are left
    /// in place.
    pub fn activate(&self) -> Result<(), TransitionError> {
        self.transition(WorkerState::Activating)?;
        self.transition(WorkerState::Activated)
    }

    /// Run the fetch handler for `request`.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError> {
        fetch::respond(&self.storage, self.network.as_ref(), request).await
    }

    pub(crate) fn mark_redundant(&self) {
        // Already-redundant workers stay as they are.
        let _ = self.transition(WorkerState::Redundant);
    }

    fn transition(&self, next: WorkerState) -> Result<(), TransitionError> {
        let mut state = rw_write(&self.state, SOURCE, "transition");
        let current = *state;
        if !current.can_transition_to(next) {
            return Err(TransitionError {
                from: current,
                to: next,
            });
        }
        *state = next;
        drop(state);

        info!(
            target = "precache::worker",
            worker = %self.id,
            from = %current,
            to = %next,
            "worker state changed"
        );
        Ok(())
    }
}
