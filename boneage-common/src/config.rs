//! Configuration file loading and compiled defaults
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 belong to the binary's argument parser; this module
//! provides the TOML layer and the defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Interface address to bind, e.g. "127.0.0.1"
    #[serde(default)]
    pub bind: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// External bone age prediction endpoint
    #[serde(default)]
    pub prediction_url: Option<String>,

    /// Endpoint receiving fire-and-forget prediction records
    #[serde(default)]
    pub log_endpoint: Option<String>,

    /// Prediction request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Upper bound for uploaded image size
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,

    /// Sessions idle for longer than this are ended
    #[serde(default)]
    pub session_idle_timeout_secs: Option<u64>,

    /// Forward prediction records to the log endpoint
    #[serde(default)]
    pub telemetry: Option<bool>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Built-in defaults used when no other source provides a value
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub bind: String,
    pub port: u16,
    pub prediction_url: String,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub session_idle_timeout_secs: u64,
    pub telemetry: bool,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            prediction_url: "http://localhost:8000/predict".to_string(),
            request_timeout_secs: 30,
            max_upload_bytes: 20 * 1024 * 1024,
            session_idle_timeout_secs: 3600,
            telemetry: true,
            log_level: default_log_level(),
        }
    }
}

impl CompiledDefaults {
    /// Default log endpoint: this service's own inbound logging route
    pub fn log_endpoint_for(bind: &str, port: u16) -> String {
        let host = if bind == "0.0.0.0" { "127.0.0.1" } else { bind };
        format!("http://{}:{}/api/log-prediction", host, port)
    }
}

/// Platform config file location: `<config_dir>/boneage/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("boneage").join("config.toml"))
}

/// Where the TOML layer came from
///
/// Config is read before the tracing subscriber exists (the file can set the
/// log level), so loading only reports; [`ConfigSource::log`] runs later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Loaded(PathBuf),
    Missing(PathBuf),
    /// File present but unusable; carries the error text
    Invalid(String),
    NoConfigDir,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::Loaded(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => {
                info!("No config file at {}, using defaults", path.display())
            }
            ConfigSource::Invalid(e) => warn!("{} (continuing with defaults)", e),
            ConfigSource::NoConfigDir => info!("No config directory available, using defaults"),
        }
    }
}

/// Load a TOML config file
///
/// A missing file is not an error: defaults apply.
/// A file that exists but cannot be read or parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file, falling back to defaults on any error
pub fn load_toml_config_or_default(path: Option<&Path>) -> (TomlConfig, ConfigSource) {
    let Some(path) = path else {
        return (TomlConfig::default(), ConfigSource::NoConfigDir);
    };
    if !path.exists() {
        return (TomlConfig::default(), ConfigSource::Missing(path.to_path_buf()));
    }

    match load_toml_config(path) {
        Ok(config) => (config, ConfigSource::Loaded(path.to_path_buf())),
        Err(e) => (TomlConfig::default(), ConfigSource::Invalid(e.to_string())),
    }
}

/// Check that a URL setting has an http(s) scheme
pub fn validate_http_url(setting: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} must be an http:// or https:// URL, got '{}'",
            setting, value
        )))
    }
}
