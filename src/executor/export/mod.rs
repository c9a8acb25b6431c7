//! Export pipeline for saved searches
//!
//! This module holds every stage of one export:
//! - planning the fetch against the index's max result window
//! - fetching hits with a bounded search or a scroll cursor
//! - projecting hits onto flat records
//! - serializing records as spreadsheet-safe CSV
//!
//! # Architecture
//!
//! 1. **planner**: count query plus window lookup produce a `FetchPlan`
//! 2. **StreamingQuery**: yields hit batches and releases the cursor on close
//! 3. **projection**: flattens hits into `FlatRecord`s
//! 4. **CsvSerializer**: renders the records
//!
//! These are orchestrated by the **ExportCoordinator**.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use saved_search_export::config::Config;
//! use saved_search_export::executor::ExportCoordinator;
//! use saved_search_export::saved_search::{ExportRequest, ExportSpec, SavedObjectStore};
//! use saved_search_export::search::EngineClient;
//!
//! # async fn run() -> saved_search_export::error::Result<()> {
//! let config = Config::default();
//! let client = Arc::new(EngineClient::new(&config.engine).expect("client"));
//! let descriptor = client.get_saved_search("my-search").await?;
//! let request = ExportRequest::new(chrono::Utc::now() - chrono::Duration::days(1), chrono::Utc::now());
//! let spec = ExportSpec::new("my-search", &descriptor, &request)?;
//!
//! let outcome = ExportCoordinator::new(client).execute(&spec).await?;
//! println!("{}", outcome.body);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod planner;
pub mod progress;
pub mod projection;
pub mod streaming;
pub mod writers;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::ExportCoordinator;
pub use planner::FetchPlan;
pub use progress::ProgressTracker;
pub use projection::{Cell, FlatRecord};
pub use streaming::StreamingQuery;
pub use writers::CsvSerializer;
