//! Count planner
//!
//! Decides how much to fetch and whether a scroll cursor is needed, before
//! any data query is issued.

use tracing::{debug, info};

use crate::error::{PlanError, Result};
use crate::search::{EngineQuery, SearchBackend};

/// How the fetcher retrieves the result set of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    /// Documents matching the compiled query.
    pub matching_count: u64,
    /// `min(limit ?? matching_count, matching_count)`
    pub total_to_fetch: u64,
    /// Smallest max result window across the pattern's indices.
    pub batch_size: u64,
    /// Set when the total does not fit into one bounded search.
    pub use_cursor: bool,
}

impl FetchPlan {
    pub fn new(matching_count: u64, limit: Option<u64>, batch_size: u64) -> Self {
        let total_to_fetch = limit.unwrap_or(matching_count).min(matching_count);
        Self {
            matching_count,
            total_to_fetch,
            batch_size,
            use_cursor: total_to_fetch > batch_size,
        }
    }

    /// Nothing to fetch; the export short-circuits to an empty artifact.
    pub fn is_empty(&self) -> bool {
        self.total_to_fetch == 0
    }

    /// Upper bound on cursor advances after the first batch.
    pub fn max_advances(&self) -> u64 {
        if self.use_cursor {
            self.total_to_fetch / self.batch_size
        } else {
            0
        }
    }
}

/// Resolve the window, count matches and derive the plan.
///
/// A failed window lookup is fatal: an unbounded window is never assumed.
pub async fn plan(
    backend: &dyn SearchBackend,
    query: &EngineQuery,
    index_pattern: &str,
    limit: Option<u64>,
) -> Result<FetchPlan> {
    let window = backend
        .max_result_window(index_pattern)
        .await
        .map_err(PlanError::WindowLookup)?;
    if window == 0 {
        return Err(PlanError::InvalidWindow(format!(
            "max_result_window of '{index_pattern}' is 0"
        ))
        .into());
    }

    let matching_count = backend
        .count(index_pattern, query)
        .await
        .map_err(PlanError::Count)?;

    let plan = FetchPlan::new(matching_count, limit, window);
    debug!("Fetch plan for '{}': {:?}", index_pattern, plan);
    info!(
        "Planned export of {} of {} matching documents{}",
        plan.total_to_fetch,
        plan.matching_count,
        if plan.use_cursor { " using a scroll cursor" } else { "" }
    );

    Ok(plan)
}
