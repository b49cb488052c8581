//! Command-line configuration.
//!
//! Every flag can also be given through the environment variable shown in
//! `--help`. The webhook secret comes from the file named by
//! `--storage.github-secret`, or failing that from `GITHUB_WEBHOOK_SECRET`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::directory::ReloadSchedule;
use crate::directory::refresh::ScheduleError;
use crate::types::Project;
use crate::webhooks::WebhookSecret;

/// Errors from validating parsed arguments.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no webhook secret: pass --storage.github-secret or set GITHUB_WEBHOOK_SECRET")]
    MissingSecret,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("failed to read webhook secret from {}: {source}", .path.display())]
    SecretFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("webhook secret is empty")]
    EmptySecret,
}

/// Receives GitHub issue webhooks and exports the maintenance flags they
/// carry as Prometheus metrics.
#[derive(Debug, Parser)]
#[command(name = "github-maintenance-exporter", version)]
pub struct Args {
    /// Address to listen on for webhooks and telemetry.
    #[arg(
        long = "web.listen-address",
        env = "GMX_LISTEN_ADDRESS",
        default_value = "0.0.0.0:9999"
    )]
    pub listen_address: SocketAddr,

    /// Filesystem path for the state file.
    #[arg(
        long = "storage.state-file",
        env = "GMX_STATE_FILE",
        default_value = "/tmp/gmx-state"
    )]
    pub state_file: PathBuf,

    /// File containing the shared GitHub webhook secret.
    #[arg(long = "storage.github-secret", env = "GMX_GITHUB_SECRET_PATH")]
    pub github_secret: Option<PathBuf>,

    /// The webhook secret itself, used when no secret file is given.
    #[arg(
        long = "github.webhook-secret",
        env = "GITHUB_WEBHOOK_SECRET",
        hide_env_values = true
    )]
    pub webhook_secret: Option<String>,

    /// GCP project this instance serves (mlab-sandbox, mlab-staging, mlab-oti).
    #[arg(long, env = "GMX_PROJECT")]
    pub project: Project,

    /// Siteinfo endpoint; defaults to the project's.
    #[arg(long = "siteinfo.url", env = "GMX_SITEINFO_URL")]
    pub siteinfo_url: Option<String>,

    /// Minimum time to wait between reloads of the site directory.
    #[arg(long = "reloadmin", env = "GMX_RELOAD_MIN", default_value = "1h", value_parser = parse_duration)]
    pub reload_min: Duration,

    /// Expected time to wait between reloads of the site directory.
    #[arg(long = "reloadtime", env = "GMX_RELOAD_TIME", default_value = "5h", value_parser = parse_duration)]
    pub reload_time: Duration,

    /// Maximum time to wait between reloads of the site directory.
    #[arg(long = "reloadmax", env = "GMX_RELOAD_MAX", default_value = "24h", value_parser = parse_duration)]
    pub reload_max: Duration,
}

/// Everything `main` needs to start the service.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub state_file: PathBuf,
    pub webhook_secret: WebhookSecret,
    pub project: Project,
    pub siteinfo_url: String,
    pub reload: ReloadSchedule,
}

impl Config {
    /// Parses the process arguments and environment, exiting with usage on
    /// a malformed flag.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(Args::parse())
    }

    /// Validates parsed arguments: reads the secret and checks the reload
    /// window.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let webhook_secret = read_secret(args.github_secret, args.webhook_secret)?;
        let reload = ReloadSchedule::new(args.reload_min, args.reload_time, args.reload_max)?;
        let siteinfo_url = args
            .siteinfo_url
            .unwrap_or_else(|| args.project.siteinfo_url());

        Ok(Config {
            listen_address: args.listen_address,
            state_file: args.state_file,
            webhook_secret,
            project: args.project,
            siteinfo_url,
            reload,
        })
    }
}

/// The secret file takes precedence over the inline value. Surrounding
/// whitespace is stripped either way.
fn read_secret(path: Option<PathBuf>, inline: Option<String>) -> Result<WebhookSecret, ConfigError> {
    let secret = match path {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::SecretFile { path, source })?,
        None => inline.ok_or(ConfigError::MissingSecret)?,
    };

    let secret = secret.trim();
    if secret.is_empty() {
        return Err(ConfigError::EmptySecret);
    }
    Ok(WebhookSecret::new(secret))
}

/// Parses `90s`, `30m`, `5h` or `1d`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (num_str, scale) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1),
        Some((i, 'm')) => (&s[..i], 60),
        Some((i, 'h')) => (&s[..i], 60 * 60),
        Some((i, 'd')) => (&s[..i], 24 * 60 * 60),
        _ => (s.as_str(), 1),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid duration: {s}"))?;
    num.checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration out of range: {s}"))
}
