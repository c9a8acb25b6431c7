use std::{fmt, io};

use super::engine::EngineError;

/// Crate-wide `Result` type using [`ExportError`] as the error.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for an export request.
///
/// Any of these aborts the whole export; no partial CSV is produced.
#[derive(Debug)]
pub enum ExportError {
    /// Stored filter or request parameters could not be compiled.
    Compile(CompileError),

    /// Fetch planning failed before any data query was issued.
    Plan(PlanError),

    /// Data retrieval failed.
    Fetch(FetchError),

    /// A retrieved document could not be projected.
    Projection(ProjectionError),

    /// Saved-search lookup failed.
    Lookup(LookupError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors while writing the artifact.
    Io(io::Error),

    /// The surrounding request cancelled the export.
    Cancelled,

    /// The caller-supplied deadline elapsed.
    DeadlineExceeded,

    /// Generic error with a free-form message.
    Generic(String),
}

/// Filter compilation and request validation errors.
#[derive(Debug)]
pub enum CompileError {
    /// Stored search-source JSON could not be parsed.
    MalformedFilter(String),

    /// Filter `type` outside the supported set.
    UnknownFilterKind(String),

    /// Time range start is after its end.
    InvalidTimeRange { start: i64, end: i64 },

    /// Requested row limit is not a positive integer.
    InvalidLimit(u64),
}

/// Count planner errors.
#[derive(Debug)]
pub enum PlanError {
    /// Reading the index max-result-window setting failed.
    WindowLookup(EngineError),

    /// Window setting was present but unusable.
    InvalidWindow(String),

    /// Count query failed.
    Count(EngineError),
}

/// Batch fetcher errors.
#[derive(Debug)]
pub enum FetchError {
    /// Single bounded search failed.
    Search(EngineError),

    /// Opening the scroll cursor failed.
    ScrollOpen(EngineError),

    /// Advancing the scroll cursor failed.
    ScrollAdvance { advance: u64, source: EngineError },

    /// Engine opened a scroll without returning its id.
    MissingScrollId,

    /// Clearing the scroll cursor failed.
    ScrollRelease(EngineError),
}

/// Row projection errors.
#[derive(Debug)]
pub enum ProjectionError {
    /// Hit source is not a JSON object.
    InvalidDocument(String),

    /// Doc-value rendering of a date field could not be parsed.
    InvalidDate { field: String, value: String },
}

/// Saved-search lookup errors.
#[derive(Debug)]
pub enum LookupError {
    /// No saved search with this id.
    NotFound(String),

    /// Saved object exists but is missing required attributes.
    InvalidDescriptor(String),

    /// Index pattern referenced by the saved search could not be resolved.
    IndexPatternNotFound(String),

    /// Engine request failed.
    Engine(EngineError),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Compile(e) => write!(f, "Compilation error: {e}"),
            ExportError::Plan(e) => write!(f, "Planning error: {e}"),
            ExportError::Fetch(e) => write!(f, "Fetch error: {e}"),
            ExportError::Projection(e) => write!(f, "Projection error: {e}"),
            ExportError::Lookup(e) => write!(f, "Saved search lookup error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Cancelled => write!(f, "Export cancelled"),
            ExportError::DeadlineExceeded => write!(f, "Export deadline exceeded"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::MalformedFilter(msg) => write!(f, "Malformed stored filter: {msg}"),
            CompileError::UnknownFilterKind(kind) => write!(f, "Unknown filter type: {kind}"),
            CompileError::InvalidTimeRange { start, end } => {
                write!(f, "Time range start {start} is after end {end}")
            }
            CompileError::InvalidLimit(limit) => {
                write!(f, "Row limit must be positive, got {limit}")
            }
        }
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::WindowLookup(e) => write!(f, "Max result window lookup failed: {e}"),
            PlanError::InvalidWindow(msg) => write!(f, "Invalid max result window: {msg}"),
            PlanError::Count(e) => write!(f, "Count query failed: {e}"),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Search(e) => write!(f, "Search failed: {e}"),
            FetchError::ScrollOpen(e) => write!(f, "Opening scroll failed: {e}"),
            FetchError::ScrollAdvance { advance, source } => {
                write!(f, "Scroll advance #{advance} failed: {source}")
            }
            FetchError::MissingScrollId => write!(f, "Engine did not return a scroll id"),
            FetchError::ScrollRelease(e) => write!(f, "Releasing scroll failed: {e}"),
        }
    }
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionError::InvalidDocument(msg) => write!(f, "Invalid document: {msg}"),
            ProjectionError::InvalidDate { field, value } => {
                write!(f, "Cannot parse date '{value}' in field '{field}'")
            }
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound(id) => write!(f, "Saved search not found: {id}"),
            LookupError::InvalidDescriptor(msg) => write!(f, "Invalid saved search: {msg}"),
            LookupError::IndexPatternNotFound(msg) => {
                write!(f, "Index pattern not found: {msg}")
            }
            LookupError::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            ExportError::Plan(PlanError::WindowLookup(e) | PlanError::Count(e)) => Some(e),
            ExportError::Fetch(
                FetchError::Search(e)
                | FetchError::ScrollOpen(e)
                | FetchError::ScrollAdvance { source: e, .. }
                | FetchError::ScrollRelease(e),
            ) => Some(e),
            ExportError::Lookup(LookupError::Engine(e)) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for CompileError {}
impl std::error::Error for PlanError {}
impl std::error::Error for FetchError {}
impl std::error::Error for ProjectionError {}
impl std::error::Error for LookupError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<CompileError> for ExportError {
    fn from(err: CompileError) -> Self {
        ExportError::Compile(err)
    }
}

impl From<PlanError> for ExportError {
    fn from(err: PlanError) -> Self {
        ExportError::Plan(err)
    }
}

impl From<FetchError> for ExportError {
    fn from(err: FetchError) -> Self {
        ExportError::Fetch(err)
    }
}

impl From<ProjectionError> for ExportError {
    fn from(err: ProjectionError) -> Self {
        ExportError::Projection(err)
    }
}

impl From<LookupError> for ExportError {
    fn from(err: LookupError) -> Self {
        ExportError::Lookup(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}

impl ExportError {
    /// Short name of the phase that failed, for the caller's messaging.
    pub fn phase(&self) -> &'static str {
        match self {
            ExportError::Compile(_) => "compile",
            ExportError::Plan(_) => "plan",
            ExportError::Fetch(_) => "fetch",
            ExportError::Projection(_) => "project",
            ExportError::Lookup(_) => "lookup",
            ExportError::Config(_) => "config",
            ExportError::Io(_) => "deliver",
            ExportError::Cancelled | ExportError::DeadlineExceeded => "cancelled",
            ExportError::Generic(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        let err: ExportError = PlanError::InvalidWindow("0".into()).into();
        assert_eq!(err.phase(), "plan");

        let err: ExportError = FetchError::MissingScrollId.into();
        assert_eq!(err.phase(), "fetch");
        assert_eq!(
            err.to_string(),
            "Fetch error: Engine did not return a scroll id"
        );
    }

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::InvalidTimeRange { start: 10, end: 5 };
        assert_eq!(err.to_string(), "Time range start 10 is after end 5");
    }

    #[test]
    fn test_source_chain_exposes_engine_error() {
        use std::error::Error;

        let err: ExportError = PlanError::Count(EngineError::Decode("bad json".into())).into();
        assert!(err.source().is_some());
    }
}
