//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::HashSet,
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::{
    application::{
        install::InstallPolicy,
        worker::{DEFAULT_ASSETS, DEFAULT_CACHE_NAME},
    },
    domain::normalize_target,
};

pub use cli::{
    CliArgs, Command, InstallArgs, ServeArgs, ServeOverrides, UpstreamOverrides, WorkerOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "precache";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 4000;
const DEFAULT_ADMIN_PORT: u16 = 4001;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_UPSTREAM_ORIGIN: &str = "http://127.0.0.1:8080";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPSTREAM_MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub worker: WorkerSettings,
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub max_request_bytes: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub cache_name: String,
    pub assets: Vec<String>,
    pub install_policy: InstallPolicy,
    pub skip_waiting: bool,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub origin: Url,
    pub timeout: Duration,
    pub max_body_bytes: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PRECACHE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Install(args)) => {
            raw.apply_worker_overrides(&args.worker);
            raw.apply_upstream_overrides(&args.upstream);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    worker: RawWorkerSettings,
    upstream: RawUpstreamSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWorkerSettings {
    cache_name: Option<String>,
    assets: Option<Vec<String>>,
    install_policy: Option<String>,
    skip_waiting: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    origin: Option<String>,
    timeout_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(limit) = overrides.max_request_bytes {
            self.server.max_request_bytes = Some(limit);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_worker_overrides(&overrides.worker);
        self.apply_upstream_overrides(&overrides.upstream);
    }

    fn apply_worker_overrides(&mut self, overrides: &WorkerOverrides) {
        if let Some(name) = overrides.cache_name.as_ref() {
            self.worker.cache_name = Some(name.clone());
        }
        if !overrides.assets.is_empty() {
            self.worker.assets = Some(overrides.assets.clone());
        }
        if let Some(policy) = overrides.install_policy.as_ref() {
            self.worker.install_policy = Some(policy.clone());
        }
        if let Some(skip) = overrides.skip_waiting {
            self.worker.skip_waiting = Some(skip);
        }
    }

    fn apply_upstream_overrides(&mut self, overrides: &UpstreamOverrides) {
        if let Some(origin) = overrides.origin.as_ref() {
            self.upstream.origin = Some(origin.clone());
        }
        if let Some(seconds) = overrides.timeout_seconds {
            self.upstream.timeout_seconds = Some(seconds);
        }
        if let Some(limit) = overrides.max_body_bytes {
            self.upstream.max_body_bytes = Some(limit);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            worker,
            upstream,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let upstream = build_upstream_settings(upstream)?;
        let worker = build_worker_settings(worker, &upstream.origin)?;

        Ok(Self {
            server,
            logging,
            worker,
            upstream,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }
    if admin_port == public_port {
        return Err(LoadError::invalid(
            "server.admin_port",
            "must differ from server.public_port",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    let max_request_bytes = non_zero_usize(
        server.max_request_bytes.unwrap_or(DEFAULT_MAX_REQUEST_BYTES),
        "server.max_request_bytes",
    )?;

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        max_request_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_worker_settings(
    worker: RawWorkerSettings,
    origin: &Url,
) -> Result<WorkerSettings, LoadError> {
    let cache_name = worker
        .cache_name
        .unwrap_or_else(|| DEFAULT_CACHE_NAME.to_string())
        .trim()
        .to_string();
    if cache_name.is_empty() {
        return Err(LoadError::invalid(
            "worker.cache_name",
            "cache name must not be empty",
        ));
    }

    let configured = worker
        .assets
        .unwrap_or_else(|| DEFAULT_ASSETS.iter().map(|asset| asset.to_string()).collect());
    let mut seen = HashSet::new();
    let mut assets = Vec::with_capacity(configured.len());
    for asset in configured {
        if asset.trim().is_empty() {
            return Err(LoadError::invalid(
                "worker.assets",
                "asset URLs must not be empty",
            ));
        }
        let normalized = asset_key(asset.trim(), origin)?;
        if !seen.insert(normalized.clone()) {
            return Err(LoadError::invalid(
                "worker.assets",
                format!("duplicate asset `{normalized}`"),
            ));
        }
        assets.push(normalized);
    }

    let install_policy = match worker.install_policy {
        Some(policy) => policy
            .parse::<InstallPolicy>()
            .map_err(|reason| LoadError::invalid("worker.install_policy", reason))?,
        None => InstallPolicy::default(),
    };

    Ok(WorkerSettings {
        cache_name,
        assets,
        install_policy,
        skip_waiting: worker.skip_waiting.unwrap_or(true),
    })
}

/// Cache key for a configured asset. Absolute URLs must share the upstream
/// origin and are reduced to their path and query.
fn asset_key(asset: &str, origin: &Url) -> Result<String, LoadError> {
    let Ok(parsed) = Url::parse(asset) else {
        return Ok(normalize_target(asset));
    };
    if parsed.origin() != origin.origin() {
        return Err(LoadError::invalid(
            "worker.assets",
            format!("asset `{asset}` is not on the upstream origin `{origin}`"),
        ));
    }

    let mut key = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        key.push('?');
        key.push_str(query);
    }
    Ok(key)
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let raw_origin = upstream
        .origin
        .unwrap_or_else(|| DEFAULT_UPSTREAM_ORIGIN.to_string());
    let origin = Url::parse(raw_origin.trim())
        .map_err(|err| LoadError::invalid("upstream.origin", format!("failed to parse: {err}")))?;

    if !matches!(origin.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "upstream.origin",
            format!("unsupported scheme `{}`", origin.scheme()),
        ));
    }
    if origin.host_str().is_none() {
        return Err(LoadError::invalid("upstream.origin", "origin must have a host"));
    }
    if origin.path() != "/" || origin.query().is_some() {
        return Err(LoadError::invalid(
            "upstream.origin",
            "origin must not carry a path or query",
        ));
    }

    let timeout_seconds = upstream
        .timeout_seconds
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "upstream.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let max_body_bytes = non_zero_usize(
        upstream
            .max_body_bytes
            .unwrap_or(DEFAULT_UPSTREAM_MAX_BODY_BYTES),
        "upstream.max_body_bytes",
    )?;

    Ok(UpstreamSettings {
        origin,
        timeout: Duration::from_secs(timeout_seconds),
        max_body_bytes,
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value = NonZeroU64::new(value)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))?;
    let value_usize: usize = value
        .get()
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
