use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the precache binary.
#[derive(Debug, Parser)]
#[command(name = "precache", version, about = "Cache-first asset worker")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRECACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Install a worker, then proxy requests through it.
    Serve(Box<ServeArgs>),
    /// Run the install handler once and print the report.
    Install(InstallArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct InstallArgs {
    #[command(flatten)]
    pub worker: WorkerOverrides,

    #[command(flatten)]
    pub upstream: UpstreamOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerOverrides {
    /// Override the name of the cache assets are stored in.
    #[arg(long = "cache-name", value_name = "NAME")]
    pub cache_name: Option<String>,

    /// Replace the precached asset list (repeat for each asset).
    #[arg(long = "asset", value_name = "URL")]
    pub assets: Vec<String>,

    /// Override the install failure policy (fail-fast|best-effort).
    #[arg(long = "install-policy", value_name = "POLICY")]
    pub install_policy: Option<String>,

    /// Toggle immediate activation after install.
    #[arg(
        long = "skip-waiting",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub skip_waiting: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct UpstreamOverrides {
    /// Override the upstream origin requests fall through to.
    #[arg(long = "upstream-origin", value_name = "URL")]
    pub origin: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// Override the largest upstream response body accepted, in bytes.
    #[arg(long = "upstream-max-body-bytes", value_name = "BYTES")]
    pub max_body_bytes: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub worker: WorkerOverrides,

    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the proxy listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the admin listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the largest request body accepted from clients, in bytes.
    #[arg(long = "server-max-request-bytes", value_name = "BYTES")]
    pub max_request_bytes: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
