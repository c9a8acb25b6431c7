//! Configuration management for ssexport
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Search engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Export behaviour configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search-engine connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the engine REST endpoint
    #[serde(default = "default_url")]
    pub url: String,

    /// Basic-auth user name
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Index holding saved searches and index patterns
    #[serde(default = "default_saved_objects_index")]
    pub saved_objects_index: String,

    /// How long the engine keeps a scroll cursor alive between batches
    #[serde(default = "default_scroll_keep_alive")]
    pub scroll_keep_alive: String,
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Prefix formula-like values with an apostrophe
    #[serde(default = "default_excel_sanitize")]
    pub excel_sanitize: bool,

    /// Directory artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Show a progress bar while fetching
    #[serde(default)]
    pub show_progress: bool,

    /// Row cap applied when the request does not give one
    #[serde(default)]
    pub default_limit: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_saved_objects_index() -> String {
    ".kibana".to_string()
}

fn default_scroll_keep_alive() -> String {
    "1m".to_string()
}

fn default_excel_sanitize() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            timeout: default_timeout(),
            saved_objects_index: default_saved_objects_index(),
            scroll_keep_alive: default_scroll_keep_alive(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            excel_sanitize: default_excel_sanitize(),
            output_dir: default_output_dir(),
            show_progress: false,
            default_limit: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(format!("{}: {}", path.display(), e))
            }
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from an explicit file, or the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load file configuration (if any) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `SSEXPORT_*` overrides read through `lookup`
    ///
    /// Example: `SSEXPORT_ENGINE_URL=https://search:9200`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SSEXPORT_ENGINE_URL") {
            self.engine.url = url;
        }
        if let Some(user) = lookup("SSEXPORT_ENGINE_USERNAME") {
            self.engine.username = Some(user);
        }
        if let Some(password) = lookup("SSEXPORT_ENGINE_PASSWORD") {
            self.engine.password = Some(password);
        }
        if let Some(timeout) = lookup("SSEXPORT_ENGINE_TIMEOUT") {
            self.engine.timeout = parse_env_value("SSEXPORT_ENGINE_TIMEOUT", &timeout)?;
        }
        if let Some(sanitize) = lookup("SSEXPORT_EXCEL_SANITIZE") {
            self.export.excel_sanitize = parse_env_value("SSEXPORT_EXCEL_SANITIZE", &sanitize)?;
        }
        if let Some(dir) = lookup("SSEXPORT_OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ssexport")
            .join("config.toml")
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.url.trim().is_empty() {
            return Err(ConfigError::MissingField("engine.url".into()).into());
        }
        if !self.engine.url.starts_with("http://") && !self.engine.url.starts_with("https://") {
            return Err(invalid("engine.url", &self.engine.url));
        }
        if self.engine.timeout == 0 {
            return Err(invalid("engine.timeout", "0"));
        }
        if !is_valid_keep_alive(&self.engine.scroll_keep_alive) {
            return Err(invalid("engine.scroll_keep_alive", &self.engine.scroll_keep_alive));
        }
        if self.export.default_limit == Some(0) {
            return Err(invalid("export.default_limit", "0"));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn parse_env_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

/// Engine time units: a positive integer followed by `ms`, `s`, `m`, `h` or `d`.
fn is_valid_keep_alive(s: &str) -> bool {
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => return false,
    };
    !digits.is_empty()
        && digits.parse::<u64>().map(|n| n > 0).unwrap_or(false)
        && matches!(unit, "ms" | "s" | "m" | "h" | "d")
}
