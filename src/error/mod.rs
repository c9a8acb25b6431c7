//! Error handling for saved-search exports.
//!
//! Every fatal failure names the phase it came from, so callers can tell a
//! broken saved search apart from an unreachable engine or a failed scroll:
//! - [`CompileError`]: stored filter JSON or request parameters are unusable
//! - [`PlanError`]: window lookup or count query failed
//! - [`FetchError`]: search or cursor advance failed
//! - [`ProjectionError`]: a hit does not have the expected document shape
//! - [`LookupError`]: the saved search could not be resolved
//!
//! Engine failures carry a structured [`ErrorInfo`] extracted from the
//! engine's JSON error body.
//!
//! # Example
//!
//! ```rust
//! use saved_search_export::error::{CompileError, ExportError};
//!
//! let err: ExportError = CompileError::UnknownFilterKind("range".into()).into();
//! assert!(err.to_string().starts_with("Compilation error"));
//! ```

pub mod engine;
pub mod kinds;

pub use engine::{EngineError, ErrorInfo};
pub use kinds::{
    CompileError, ConfigError, ExportError, FetchError, LookupError, PlanError, ProjectionError,
    Result,
};
