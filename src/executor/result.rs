//! Export result types
//!
//! This module defines what an export hands back to its caller:
//! - ExportOutcome: CSV body plus structured statistics
//! - PhaseTimings: elapsed time per pipeline phase
//! - ReportArtifact: the named artifact ready for delivery

use serde::Serialize;

/// Elapsed milliseconds per export phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTimings {
    pub compile_ms: u64,
    pub plan_ms: u64,
    pub fetch_ms: u64,
    pub project_ms: u64,
    pub serialize_ms: u64,
}

impl PhaseTimings {
    pub fn total_ms(&self) -> u64 {
        self.compile_ms + self.plan_ms + self.fetch_ms + self.project_ms + self.serialize_ms
    }
}

/// Result of one export run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportOutcome {
    /// CSV text; empty when nothing matched.
    #[serde(skip)]
    pub body: String,

    /// Documents matching the compiled query
    pub matching_count: u64,

    /// Rows written to the body
    pub records_exported: u64,

    /// Hit batches received from the engine
    pub batches: u64,

    /// Whether a scroll cursor was opened
    pub used_cursor: bool,

    pub timings: PhaseTimings,
}

impl ExportOutcome {
    /// Outcome of an export whose query matched nothing.
    pub fn empty(timings: PhaseTimings) -> Self {
        Self {
            body: String::new(),
            matching_count: 0,
            records_exported: 0,
            batches: 0,
            used_cursor: false,
            timings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Named CSV artifact for the delivery layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportArtifact {
    pub file_name: String,
    pub body: String,
    pub outcome: ExportOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_stats_only() {
        let outcome = ExportOutcome {
            body: "a\n1".into(),
            matching_count: 1,
            records_exported: 1,
            batches: 1,
            used_cursor: false,
            timings: PhaseTimings {
                plan_ms: 3,
                fetch_ms: 5,
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("body").is_none());
        assert_eq!(json["records_exported"], 1);
        assert_eq!(outcome.timings.total_ms(), 8);
    }
}
