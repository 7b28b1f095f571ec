//! Registration: which worker version currently controls requests.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::{
    cache::{
        CacheStorage,
        lock::{rw_read, rw_write},
    },
    domain::{FetchRequest, TransitionError},
};

use super::{
    fetch::{self, FetchError, FetchOutcome},
    install::{InstallError, InstallReport},
    network::Network,
    worker::{ServiceWorker, WorkerConfig},
};

const SOURCE: &str = "application::registration";

/// Tracks the active and waiting worker versions sharing one cache storage.
pub struct Registration {
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    active: RwLock<Option<Arc<ServiceWorker>>>,
    waiting: RwLock<Option<Arc<ServiceWorker>>>,
}

impl Registration {
    pub fn new(storage: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            storage,
            network,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
        }
    }

    pub fn storage(&self) -> &Arc<CacheStorage> {
        &self.storage
    }

    pub fn active(&self) -> Option<Arc<ServiceWorker>> {
        rw_read(&self.active, SOURCE, "active").clone()
    }

    pub fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        rw_read(&self.waiting, SOURCE, "waiting").clone()
    }

    /// Install a new worker version built from `config`.
    ///
    /// When the worker activates on install it immediately replaces the
    /// active version; otherwise it becomes the waiting version. A failed
    /// install leaves the current versions untouched.
    pub async fn register(
        &self,
        config: WorkerConfig,
    ) -> Result<(Arc<ServiceWorker>, InstallReport), InstallError> {
        let worker = Arc::new(ServiceWorker::new(
            config,
            Arc::clone(&self.storage),
            Arc::clone(&self.network),
        ));

        let report = worker.install().await.inspect_err(|err| {
            warn!(
                target = "precache::registration",
                worker = %worker.id(),
                error = %err,
                "worker install failed"
            );
        })?;

        if worker.is_active() {
            // A version that skipped waiting also supersedes any waiting one.
            let stale = rw_write(&self.waiting, SOURCE, "register.skip_waiting").take();
            if let Some(stale) = stale {
                stale.mark_redundant();
            }
            self.promote(Arc::clone(&worker));
        } else {
            let previous = rw_write(&self.waiting, SOURCE, "register.waiting")
                .replace(Arc::clone(&worker));
            if let Some(previous) = previous {
                previous.mark_redundant();
            }
        }

        Ok((worker, report))
    }

    /// Activate the waiting worker, if any, and make it the active version.
    pub fn activate_waiting(&self) -> Result<Option<Arc<ServiceWorker>>, TransitionError> {
        let Some(worker) = rw_write(&self.waiting, SOURCE, "activate_waiting").take() else {
            return Ok(None);
        };

        worker.activate()?;
        self.promote(Arc::clone(&worker));
        Ok(Some(worker))
    }

    /// Route an intercepted request: through the active worker when there is
    /// one, straight to the network otherwise.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError> {
        match self.active() {
            Some(worker) => worker.fetch(request).await,
            None => fetch::pass_through(self.network.as_ref(), request).await,
        }
    }

    fn promote(&self, worker: Arc<ServiceWorker>) {
        let id = worker.id();
        let previous = rw_write(&self.active, SOURCE, "promote").replace(worker);

        if let Some(previous) = previous {
            info!(
                target = "precache::registration",
                worker = %id,
                replaced = %previous.id(),
                "worker superseded previous version"
            );
            previous.mark_redundant();
        } else {
            info!(
                target = "precache::registration",
                worker = %id,
                "worker now controls requests"
            );
        }
    }
}
