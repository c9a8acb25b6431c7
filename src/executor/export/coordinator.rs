//! Export coordinator for orchestrating export operations
//!
//! Runs one export as a single sequential task:
//! compile → plan → fetch → project → serialize.
//!
//! The only suspension points are engine calls. Each one races the
//! cancellation token and the deadline, except the call that opens a scroll
//! cursor: it runs to completion so the cursor id is always known, and
//! cancellation is checked right after it. Whichever way the fetch phase
//! ends, the stream is closed before the export returns.

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};
use crate::executor::result::{ExportOutcome, PhaseTimings};
use crate::filter::compile;
use crate::saved_search::ExportSpec;
use crate::search::{RawHit, SearchBackend};

use super::planner::{self, FetchPlan};
use super::progress::ProgressTracker;
use super::projection::project;
use super::streaming::{StreamingQuery, open_stream};
use super::writers::CsvSerializer;

/// Default scroll keep-alive between batches.
pub const DEFAULT_KEEP_ALIVE: &str = "1m";

/// Coordinator for export operations
///
/// Holds only request-independent settings; every call to
/// [`execute`](Self::execute) works on its own [`ExportSpec`].
pub struct ExportCoordinator {
    /// Backing search engine
    backend: Arc<dyn SearchBackend>,
    /// Scroll keep-alive, e.g. `1m`
    keep_alive: String,
    /// Cancellation token for aborting export
    cancel_token: Option<CancellationToken>,
    /// Overall time budget for one export
    deadline: Option<Duration>,
    /// Whether to show a progress bar while fetching
    show_progress: bool,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
            cancel_token: None,
            deadline: None,
            show_progress: false,
        }
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Abort with [`ExportError::DeadlineExceeded`] once `deadline` has elapsed
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Execute the export described by `spec`
    ///
    /// # Returns
    /// * `Result<ExportOutcome>` - CSV body and statistics, or the first fatal error
    pub async fn execute(&self, spec: &ExportSpec) -> Result<ExportOutcome> {
        let deadline = self.deadline.map(|d| tokio::time::Instant::now() + d);
        let mut timings = PhaseTimings::default();

        info!(
            "Starting export of saved search '{}' over '{}'",
            spec.saved_search_id(),
            spec.index_pattern_name()
        );

        // Compile
        let started = Instant::now();
        let (start, end) = spec.time_range();
        let query = compile(spec.filter_set(), spec.time_field_name(), start, end)?;
        timings.compile_ms = elapsed_ms(started);

        // Plan
        let started = Instant::now();
        let plan = self
            .guard(
                deadline,
                planner::plan(
                    self.backend.as_ref(),
                    &query,
                    spec.index_pattern_name(),
                    spec.limit(),
                ),
            )
            .await?;
        timings.plan_ms = elapsed_ms(started);

        if plan.is_empty() {
            info!("No documents to export; returning an empty artifact");
            let mut outcome = ExportOutcome::empty(timings);
            outcome.matching_count = plan.matching_count;
            return Ok(outcome);
        }

        // Fetch
        let started = Instant::now();
        let mut stream = open_stream(
            Arc::clone(&self.backend),
            spec,
            query,
            &plan,
            &self.keep_alive,
        );
        let used_cursor = stream.uses_cursor();
        let fetched = self.drain(stream.as_mut(), &plan, deadline).await;
        if let Err(e) = stream.close().await {
            warn!("Failed to release scroll cursor: {}", e);
        }
        let (hits, batches) = fetched?;
        timings.fetch_ms = elapsed_ms(started);

        // Project
        let started = Instant::now();
        let records = project(&hits, spec.selected_columns(), spec.date_fields())?;
        drop(hits);
        timings.project_ms = elapsed_ms(started);

        // Serialize
        let started = Instant::now();
        let body = CsvSerializer::new(spec.excel_sanitize()).serialize(&records);
        timings.serialize_ms = elapsed_ms(started);

        info!(
            "Export completed: {} records, {} batches, {} bytes, {} ms",
            records.len(),
            batches,
            body.len(),
            timings.total_ms()
        );

        Ok(ExportOutcome {
            body,
            matching_count: plan.matching_count,
            records_exported: records.len() as u64,
            batches,
            used_cursor,
            timings,
        })
    }

    /// Pull every batch the plan allows.
    async fn drain(
        &self,
        stream: &mut dyn StreamingQuery,
        plan: &FetchPlan,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<(Vec<RawHit>, u64)> {
        let tracker = ProgressTracker::new(Some(plan.total_to_fetch), self.show_progress);
        let mut hits = Vec::with_capacity(plan.total_to_fetch.min(plan.batch_size) as usize);
        let mut batches = 0u64;

        let result = loop {
            debug!("Fetching batch #{}", batches + 1);
            match self.next_batch(stream, deadline).await {
                Ok(Some(batch)) => {
                    batches += 1;
                    hits.extend(batch);
                    tracker.update(hits.len() as u64);
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        tracker.finish();
        result.map(|()| (hits, batches))
    }

    /// Fetch one batch, never abandoning a request that opens a cursor.
    async fn next_batch(
        &self,
        stream: &mut dyn StreamingQuery,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<Option<Vec<RawHit>>> {
        if !stream.opens_cursor() {
            return self.guard(deadline, stream.next_batch()).await;
        }

        self.check(deadline)?;
        let batch = stream.next_batch().await;
        self.check(deadline)?;
        batch
    }

    /// Fail if the export was cancelled or its deadline has passed.
    fn check(&self, deadline: Option<tokio::time::Instant>) -> Result<()> {
        if self.cancel_token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            info!("Export operation cancelled");
            return Err(ExportError::Cancelled);
        }
        if deadline.is_some_and(|at| tokio::time::Instant::now() >= at) {
            info!("Export deadline exceeded");
            return Err(ExportError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Race `fut` against cancellation and the deadline.
    async fn guard<T>(
        &self,
        deadline: Option<tokio::time::Instant>,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        self.check(deadline)?;

        let cancelled = async {
            match &self.cancel_token {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => {
                info!("Export operation cancelled");
                Err(ExportError::Cancelled)
            }
            _ = expired => {
                info!("Export deadline exceeded");
                Err(ExportError::DeadlineExceeded)
            }
            result = fut => result,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
