use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use crate::{
    application::{InstallPolicy, Registration, ServiceWorker, error::ErrorReport},
    domain::{WorkerId, WorkerState},
};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AdminState {
    pub registration: Arc<Registration>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health(State(state): State<AdminState>) -> Response {
    if state.registration.active().is_some() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
    ErrorReport::from_message(
        "infra::http::admin::health",
        StatusCode::SERVICE_UNAVAILABLE,
        "no active worker",
    )
    .attach(&mut response);
    response
}

#[derive(Debug, Serialize)]
struct StatusView {
    active: Option<WorkerView>,
    waiting: Option<WorkerView>,
    caches: Vec<CacheView>,
}

#[derive(Debug, Serialize)]
struct WorkerView {
    id: WorkerId,
    state: WorkerState,
    cache_name: String,
    install_policy: InstallPolicy,
}

impl From<&ServiceWorker> for WorkerView {
    fn from(worker: &ServiceWorker) -> Self {
        Self {
            id: worker.id(),
            state: worker.state(),
            cache_name: worker.config().cache_name.clone(),
            install_policy: worker.config().install_policy,
        }
    }
}

#[derive(Debug, Serialize)]
struct CacheView {
    name: String,
    keys: Vec<String>,
    size_bytes: usize,
}

async fn status(State(state): State<AdminState>) -> Json<StatusView> {
    let registration = &state.registration;
    let storage = registration.storage();

    let caches = storage
        .keys()
        .into_iter()
        .map(|name| {
            let cache = storage.open(&name);
            CacheView {
                keys: cache.keys().iter().map(|key| key.to_string()).collect(),
                size_bytes: cache.size_bytes(),
                name,
            }
        })
        .collect();

    Json(StatusView {
        active: registration.active().as_deref().map(WorkerView::from),
        waiting: registration.waiting().as_deref().map(WorkerView::from),
        caches,
    })
}
