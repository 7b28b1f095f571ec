use std::{process, sync::Arc};

use precache::{
    application::{Registration, ServiceWorker, WorkerConfig, error::AppError},
    cache::CacheStorage,
    config,
    infra::{
        error::InfraError,
        http::{self, AdminState, ProxyState},
        network::HttpNetwork,
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Install(_) => run_install(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let network = HttpNetwork::new(&settings.upstream)?;
    info!(
        target = "precache::serve",
        upstream = %network.origin(),
        cache = %settings.worker.cache_name,
        policy = %settings.worker.install_policy,
        "starting worker"
    );

    let registration = Arc::new(Registration::new(
        Arc::new(CacheStorage::new()),
        Arc::new(network),
    ));

    // Without an installed worker every request passes through to upstream.
    if let Err(err) = registration
        .register(WorkerConfig::from(&settings.worker))
        .await
    {
        warn!(
            target = "precache::serve",
            error = %err,
            "install failed, serving without an active worker"
        );
    }

    let proxy_state = ProxyState {
        registration: Arc::clone(&registration),
        max_request_bytes: settings.server.max_request_bytes.get(),
    };
    let admin_state = AdminState { registration };

    serve_http(&settings, proxy_state, admin_state).await
}

async fn run_install(settings: config::Settings) -> Result<(), AppError> {
    let network = HttpNetwork::new(&settings.upstream)?;
    let worker = ServiceWorker::new(
        WorkerConfig::from(&settings.worker),
        Arc::new(CacheStorage::new()),
        Arc::new(network),
    );

    let report = worker.install().await?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to render report: {err}")))?;
    println!("{rendered}");

    if !report.is_complete() {
        return Err(AppError::unexpected(format!(
            "{} of {} assets could not be cached",
            report.failed.len(),
            report.failed.len() + report.cached.len()
        )));
    }

    Ok(())
}

async fn serve_http(
    settings: &config::Settings,
    proxy_state: ProxyState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let proxy_router = http::build_proxy_router(proxy_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "precache::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target = "precache::serve", "shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                warn!(
                    target = "precache::serve",
                    error = %err,
                    "failed to listen for shutdown signal"
                );
                std::future::pending::<()>().await;
            }
        }
    });

    let public_server = axum::serve(public_listener, proxy_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_rx));

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
