//! Saved-Search Export Library
//!
//! This library turns a saved search (stored query, filters, column selection
//! and sort over an index pattern) into a flat, spreadsheet-safe CSV artifact.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `executor`: Export pipeline (plan, fetch, project, serialize)
//! - `filter`: Saved-search filter model and compiler
//! - `saved_search`: Saved-search lookup and export specifications
//! - `search`: Search-engine boundary and HTTP client
//!
//! # Example
//!
//! ```no_run
//! use saved_search_export::{Config, ExportExecutor, ExportRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let executor = ExportExecutor::from_config(&config)?;
//!
//!     let now = chrono::Utc::now();
//!     let request = ExportRequest::new(now - chrono::Duration::days(7), now).with_limit(1000);
//!     let artifact = executor.export("my-saved-search", &request, None).await?;
//!
//!     std::fs::write(&artifact.file_name, &artifact.body)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod saved_search;
pub mod search;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use executor::{ExportCoordinator, ExportExecutor, ExportOutcome, ReportArtifact};
pub use saved_search::{ExportRequest, ExportSpec, SavedObjectStore, SavedSearchDescriptor};
pub use search::{EngineClient, SearchBackend};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
