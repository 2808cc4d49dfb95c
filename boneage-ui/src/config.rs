//! Service configuration resolution
//!
//! **Priority:** CLI flag → environment variable → TOML file → compiled default
//!
//! clap covers the first two tiers (`env = ...` on each flag); the TOML and
//! default tiers come from `boneage_common::config`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use boneage_common::config::{validate_http_url, CompiledDefaults, TomlConfig};
use boneage_common::{Error, Result};
use clap::Parser;

/// Command-line arguments for boneage-ui
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "boneage-ui")]
#[command(about = "Bone age prediction workbench")]
#[command(version)]
pub struct Cli {
    /// Interface address to bind
    #[arg(long, env = "BONEAGE_BIND")]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "BONEAGE_PORT")]
    pub port: Option<u16>,

    /// External prediction endpoint (multipart POST)
    #[arg(long, env = "BONEAGE_PREDICTION_URL")]
    pub prediction_url: Option<String>,

    /// Endpoint receiving prediction log records
    #[arg(long, env = "BONEAGE_LOG_ENDPOINT")]
    pub log_endpoint: Option<String>,

    /// Prediction request timeout in seconds
    #[arg(long, env = "BONEAGE_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "BONEAGE_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// End sessions idle for this many seconds
    #[arg(long, env = "BONEAGE_SESSION_IDLE_SECS")]
    pub session_idle_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BONEAGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "BONEAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use the built-in mock predictor instead of the prediction endpoint
    /// (development only)
    #[arg(long)]
    pub mock_predictor: bool,

    /// Do not forward prediction records to the log endpoint
    #[arg(long)]
    pub no_telemetry: bool,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    pub prediction_url: String,
    pub log_endpoint: String,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
    pub session_idle_timeout: Duration,
    pub telemetry: bool,
    pub mock_predictor: bool,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge CLI/ENV values over TOML values over compiled defaults
    pub fn resolve(cli: &Cli, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();

        let bind = cli
            .bind
            .clone()
            .or_else(|| toml.bind.clone())
            .unwrap_or(defaults.bind);
        let port = cli.port.or(toml.port).unwrap_or(defaults.port);

        let prediction_url = cli
            .prediction_url
            .clone()
            .or_else(|| toml.prediction_url.clone())
            .unwrap_or(defaults.prediction_url);
        validate_http_url("prediction_url", &prediction_url)?;

        let log_endpoint = cli
            .log_endpoint
            .clone()
            .or_else(|| toml.log_endpoint.clone())
            .unwrap_or_else(|| CompiledDefaults::log_endpoint_for(&bind, port));
        validate_http_url("log_endpoint", &log_endpoint)?;

        let timeout_secs = cli
            .timeout_secs
            .or(toml.request_timeout_secs)
            .unwrap_or(defaults.request_timeout_secs);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "request timeout must be at least 1 second".to_string(),
            ));
        }

        let idle_secs = cli
            .session_idle_secs
            .or(toml.session_idle_timeout_secs)
            .unwrap_or(defaults.session_idle_timeout_secs);
        if idle_secs == 0 {
            return Err(Error::Config(
                "session idle timeout must be at least 1 second".to_string(),
            ));
        }

        let telemetry = !cli.no_telemetry && toml.telemetry.unwrap_or(defaults.telemetry);

        let log_level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| toml.logging.level.clone());

        Ok(Self {
            bind,
            port,
            prediction_url,
            log_endpoint,
            request_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes: cli
                .max_upload_bytes
                .or(toml.max_upload_bytes)
                .unwrap_or(defaults.max_upload_bytes),
            session_idle_timeout: Duration::from_secs(idle_secs),
            telemetry,
            mock_predictor: cli.mock_predictor,
            log_level,
        })
    }

    /// Address to bind the HTTP listener to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", self.bind, e)))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::default();
        Self {
            log_endpoint: CompiledDefaults::log_endpoint_for(&defaults.bind, defaults.port),
            bind: defaults.bind,
            port: defaults.port,
            prediction_url: defaults.prediction_url,
            request_timeout: Duration::from_secs(defaults.request_timeout_secs),
            max_upload_bytes: defaults.max_upload_bytes,
            session_idle_timeout: Duration::from_secs(defaults.session_idle_timeout_secs),
            telemetry: defaults.telemetry,
            mock_predictor: false,
            log_level: defaults.log_level,
        }
    }
}
