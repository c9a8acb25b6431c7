//! Command-line interface for ssexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading, overrides and validation
//! - Translating `export` arguments into an [`ExportRequest`]
//! - The `config` and `version` subcommands

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};

use crate::config::{Config, LogLevel};
use crate::error::{CompileError, Result};
use crate::saved_search::ExportRequest;

/// Saved-search CSV exporter
#[derive(Parser, Debug)]
#[command(
    name = "ssexport",
    version,
    about = "Export saved searches to spreadsheet-safe CSV",
    long_about = "Exports the documents behind a saved search over an Elasticsearch or
OpenSearch cluster into CSV, using a scroll cursor when the result set is larger
than the index's max result window."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Search engine URL
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// Username for basic authentication
    #[arg(short = 'u', long, value_name = "USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(short = 'p', long, value_name = "PASSWORD", global = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for ssexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a saved search to CSV
    Export(ExportArgs),

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Show version information
    Version,
}

/// Arguments of the `export` subcommand
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Saved search id
    #[arg(value_name = "SAVED_SEARCH_ID")]
    pub saved_search_id: String,

    /// Range start (RFC 3339 or epoch milliseconds)
    #[arg(long, value_name = "TIME", value_parser = parse_instant)]
    pub from: DateTime<Utc>,

    /// Range end (RFC 3339 or epoch milliseconds); defaults to now
    #[arg(long, value_name = "TIME", value_parser = parse_instant)]
    pub to: Option<DateTime<Utc>>,

    /// Maximum number of rows
    #[arg(short = 'n', long, value_name = "ROWS")]
    pub limit: Option<u64>,

    /// Report name used in the file name; defaults to the saved search title
    #[arg(long, value_name = "NAME")]
    pub report_name: Option<String>,

    /// Do not prefix formula-like values with an apostrophe
    #[arg(long = "no-excel-sanitize")]
    pub no_excel_sanitize: bool,

    /// Directory to write the CSV file into
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write CSV to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,

    /// Abort the export after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub deadline: Option<u64>,

    /// Show a progress bar while fetching
    #[arg(long)]
    pub progress: bool,
}

impl ExportArgs {
    /// Build the export request, filling defaults from configuration
    pub fn to_request(&self, config: &Config, now: DateTime<Utc>) -> ExportRequest {
        let mut request = ExportRequest::new(self.from, self.to.unwrap_or(now))
            .with_excel_sanitize(config.export.excel_sanitize && !self.no_excel_sanitize);
        request.limit = self.limit.or(config.export.default_limit);
        request
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline.map(Duration::from_secs)
    }
}

/// Parse an instant given as RFC 3339 text or epoch milliseconds
pub fn parse_instant(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| format!("epoch milliseconds out of range: {value}"));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid time '{value}': {e}"))
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and environment, then apply CLI overrides
    ///
    /// An invalid configuration is fatal except for the `config` subcommand,
    /// which reports the problem itself.
    fn load_config(args: &CliArgs) -> Result<Config> {
        let inspecting = matches!(args.command, Commands::Config { .. });

        let mut config = match Config::load(args.config_file.as_deref()) {
            Ok(config) => config,
            Err(e) if inspecting => {
                eprintln!("Warning: Failed to load configuration: {}", e);
                Config::default()
            }
            Err(e) => return Err(e),
        };

        Self::apply_args_to_config(&mut config, args);

        if !inspecting {
            config.validate()?;
        }
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Arguments of the `export` subcommand, if that is what was requested
    pub fn export_args(&self) -> Option<&ExportArgs> {
        match &self.args.command {
            Commands::Export(args) => Some(args),
            _ => None,
        }
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        Self::apply_engine_args(config, args);
        Self::apply_export_args(config, args);
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply engine connection arguments to configuration
    fn apply_engine_args(config: &mut Config, args: &CliArgs) {
        if let Some(url) = &args.url {
            config.engine.url = url.clone();
        }
        if let Some(username) = &args.username {
            config.engine.username = Some(username.clone());
        }
        if let Some(password) = &args.password {
            config.engine.password = Some(password.clone());
        }
        if let Some(timeout) = args.timeout {
            config.engine.timeout = timeout;
        }
    }

    /// Apply `export` arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        let Commands::Export(export) = &args.command else {
            return;
        };
        if let Some(dir) = &export.output_dir {
            config.export.output_dir = dir.clone();
        }
        if export.no_excel_sanitize {
            config.export.excel_sanitize = false;
        }
        if export.progress {
            config.export.show_progress = true;
        }
    }

    /// Handle subcommands other than `export`
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to run an export
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Version => {
                self.show_version();
                Ok(true)
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Commands::Export(_) => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("ssexport version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("❌ Configuration file does not exist");
            return;
        }

        match Config::load(self.args.config_file.as_deref()) {
            Ok(config) => match config.validate() {
                Ok(()) => println!("✅ Configuration is valid"),
                Err(e) => println!("❌ Configuration validation failed: {}", e),
            },
            Err(e) => println!("❌ Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration with the password masked
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("=== Effective Configuration ===");
        println!();

        let mut shown = self.config.clone();
        if shown.engine.password.is_some() {
            shown.engine.password = Some("***".into());
        }
        println!("{}", shown.to_toml()?);

        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}

/// Reject a time range whose start is after its end
pub fn check_range(request: &ExportRequest) -> Result<()> {
    if request.start > request.end {
        return Err(CompileError::InvalidTimeRange {
            start: request.start.timestamp_millis(),
            end: request.end.timestamp_millis(),
        }
        .into());
    }
    Ok(())
}
