use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error information extracted from a search-engine error body.
///
/// Serializes to JSON so the caller can log or forward it unchanged.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) root_cause: Option<String>,
}

impl ErrorInfo {
    /// Engine-reported error type, e.g. `index_not_found_exception`.
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    /// Human readable reason.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Failure talking to the search engine.
#[derive(Debug)]
pub enum EngineError {
    /// Connection, TLS or timeout failure before a response arrived.
    Transport(reqwest::Error),

    /// Engine answered with a non-success status.
    Status { status: u16, info: ErrorInfo },

    /// Response body did not have the expected shape.
    Decode(String),

    /// Configured engine URL cannot address REST endpoints.
    InvalidUrl(String),
}

impl EngineError {
    /// Build a status error from the raw response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let info = match serde_json::from_str::<Value>(body) {
            Ok(value) => extract_error_info(status, &value),
            Err(_) => ErrorInfo {
                status: Some(status),
                reason: (!body.trim().is_empty()).then(|| body.trim().to_string()),
                ..Default::default()
            },
        };
        EngineError::Status { status, info }
    }

    /// HTTP status if the engine answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Status { status, .. } => Some(*status),
            EngineError::Transport(e) => e.status().map(|s| s.as_u16()),
            EngineError::Decode(_) | EngineError::InvalidUrl(_) => None,
        }
    }

    /// True when the engine reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Transport(e) => write!(f, "Engine unreachable: {e}"),
            EngineError::Status { info, .. } => format_engine_error(f, info),
            EngineError::Decode(msg) => write!(f, "Unexpected engine response: {msg}"),
            EngineError::InvalidUrl(url) => write!(f, "Invalid engine URL: {url}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Decode(err.to_string())
        } else {
            EngineError::Transport(err)
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Decode(err.to_string())
    }
}

/// Render the structured info as compact JSON wrapped in an `error` field.
fn format_engine_error(f: &mut fmt::Formatter<'_>, info: &ErrorInfo) -> fmt::Result {
    let wrapper = serde_json::json!({ "error": info });
    let json_output = serde_json::to_string(&wrapper).map_err(|_| fmt::Error)?;
    write!(f, "{json_output}")
}

/// Extract structured information from an engine error body.
///
/// Handles both the object form (`{"error": {"type": ..., "reason": ...}}`)
/// and the plain string form (`{"error": "..."}`).
pub fn extract_error_info(status: u16, body: &Value) -> ErrorInfo {
    let mut info = ErrorInfo {
        status: Some(status),
        ..Default::default()
    };

    match body.get("error") {
        Some(Value::Object(error)) => {
            info.error_type = error.get("type").and_then(Value::as_str).map(str::to_string);
            info.reason = error.get("reason").and_then(Value::as_str).map(str::to_string);
            info.index = error.get("index").and_then(Value::as_str).map(str::to_string);
            info.root_cause = error
                .get("root_cause")
                .and_then(Value::as_array)
                .and_then(|causes| causes.first())
                .and_then(|cause| cause.get("reason"))
                .and_then(Value::as_str)
                .filter(|cause| Some(*cause) != info.reason.as_deref())
                .map(str::to_string);
        }
        Some(Value::String(reason)) => info.reason = Some(reason.clone()),
        _ => {
            // Document-level 404s come back as {"found": false}.
            if body.get("found").and_then(Value::as_bool) == Some(false) {
                info.reason = Some("document not found".to_string());
            }
        }
    }

    info
}
