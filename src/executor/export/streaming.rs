//! Batch fetcher
//!
//! Executes a [`FetchPlan`] as a lazy, finite sequence of hit batches:
//! - [`BoundedStreamingQuery`]: one search of size `total_to_fetch`
//! - [`ScrollStreamingQuery`]: a scroll cursor consumed batch by batch
//!
//! Batches keep the engine's sort order. A scroll cursor must be released
//! with [`StreamingQuery::close`]; if the query is dropped while a cursor is
//! still open, the release is spawned onto the current Tokio runtime.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{FetchError, Result};
use crate::saved_search::ExportSpec;
use crate::search::{EngineQuery, RawHit, SearchBackend, SearchRequest};

use super::planner::FetchPlan;

/// Source of hit batches for one export.
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch of hits
    ///
    /// # Returns
    /// * `Result<Option<Vec<RawHit>>>` - Next batch, or None once the plan is satisfied
    async fn next_batch(&mut self) -> Result<Option<Vec<RawHit>>>;

    /// Release server-side resources held by the query
    async fn close(&mut self) -> Result<()>;

    /// Whether this query reads through a scroll cursor
    fn uses_cursor(&self) -> bool;

    /// Whether the next call to [`next_batch`](Self::next_batch) creates a
    /// server-side cursor. That call must run to completion so the cursor id
    /// is known and can be released.
    fn opens_cursor(&self) -> bool {
        false
    }
}

/// Build the data query for `spec` and open the stream the plan calls for.
pub fn open_stream(
    backend: Arc<dyn SearchBackend>,
    spec: &ExportSpec,
    query: EngineQuery,
    plan: &FetchPlan,
    keep_alive: &str,
) -> Box<dyn StreamingQuery> {
    let request = SearchRequest {
        query,
        sort: spec.sort_spec().to_vec(),
        size: if plan.use_cursor {
            plan.batch_size
        } else {
            plan.total_to_fetch
        },
        source_includes: spec.source_includes(),
        docvalue_fields: spec.date_fields().iter().cloned().collect(),
    };

    let index_pattern = spec.index_pattern_name().to_string();
    if plan.use_cursor {
        Box::new(ScrollStreamingQuery::new(
            backend,
            index_pattern,
            request,
            plan,
            keep_alive,
        ))
    } else {
        Box::new(BoundedStreamingQuery::new(backend, index_pattern, request))
    }
}

/// Single bounded search.
pub struct BoundedStreamingQuery {
    backend: Arc<dyn SearchBackend>,
    index_pattern: String,
    request: Option<SearchRequest>,
}

impl BoundedStreamingQuery {
    pub fn new(backend: Arc<dyn SearchBackend>, index_pattern: String, request: SearchRequest) -> Self {
        Self {
            backend,
            index_pattern,
            request: Some(request),
        }
    }
}

#[async_trait]
impl StreamingQuery for BoundedStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawHit>>> {
        let Some(request) = self.request.take() else {
            return Ok(None);
        };

        let page = self
            .backend
            .search(&self.index_pattern, &request)
            .await
            .map_err(FetchError::Search)?;

        let mut hits = page.hits;
        hits.truncate(request.size as usize);
        debug!("Bounded search returned {} hits", hits.len());
        Ok(Some(hits))
    }

    async fn close(&mut self) -> Result<()> {
        self.request = None;
        Ok(())
    }

    fn uses_cursor(&self) -> bool {
        false
    }
}

/// Scroll cursor consumed in fixed-size batches.
///
/// After the first batch the cursor is advanced `total_to_fetch / batch_size`
/// times, stopping early only on a short batch. Hits beyond `total_to_fetch`
/// are discarded.
pub struct ScrollStreamingQuery {
    backend: Arc<dyn SearchBackend>,
    index_pattern: String,
    open_request: Option<SearchRequest>,
    keep_alive: String,
    scroll_id: Option<String>,
    total_to_fetch: u64,
    batch_size: u64,
    max_advances: u64,
    advances: u64,
    fetched: u64,
    exhausted: bool,
    closed: bool,
}

impl ScrollStreamingQuery {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        index_pattern: String,
        request: SearchRequest,
        plan: &FetchPlan,
        keep_alive: &str,
    ) -> Self {
        Self {
            backend,
            index_pattern,
            open_request: Some(request),
            keep_alive: keep_alive.to_string(),
            scroll_id: None,
            total_to_fetch: plan.total_to_fetch,
            batch_size: plan.batch_size,
            max_advances: plan.max_advances(),
            advances: 0,
            fetched: 0,
            exhausted: false,
            closed: false,
        }
    }

    /// Cursor advances issued so far (the opening search is not counted).
    pub fn advances(&self) -> u64 {
        self.advances
    }

    fn accept(&mut self, mut hits: Vec<RawHit>) -> Option<Vec<RawHit>> {
        if (hits.len() as u64) < self.batch_size {
            self.exhausted = true;
        }

        let remaining = self.total_to_fetch.saturating_sub(self.fetched);
        if hits.len() as u64 > remaining {
            debug!("Discarding {} hits beyond the planned total", hits.len() as u64 - remaining);
            hits.truncate(remaining as usize);
        }

        self.fetched += hits.len() as u64;

        debug!(
            "Fetched batch of {} hits (total: {})",
            hits.len(),
            self.fetched
        );
        (!hits.is_empty()).then_some(hits)
    }
}

#[async_trait]
impl StreamingQuery for ScrollStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawHit>>> {
        if self.closed {
            return Ok(None);
        }

        if let Some(request) = self.open_request.take() {
            let page = self
                .backend
                .open_scroll(&self.index_pattern, &request, &self.keep_alive)
                .await
                .map_err(FetchError::ScrollOpen)?;
            self.scroll_id = Some(page.scroll_id.ok_or(FetchError::MissingScrollId)?);
            return Ok(self.accept(page.hits));
        }

        if self.exhausted || self.advances >= self.max_advances {
            return Ok(None);
        }

        let Some(scroll_id) = self.scroll_id.clone() else {
            return Err(FetchError::MissingScrollId.into());
        };

        self.advances += 1;
        let page = self
            .backend
            .scroll(&scroll_id, &self.keep_alive)
            .await
            .map_err(|source| FetchError::ScrollAdvance {
                advance: self.advances,
                source,
            })?;

        if let Some(id) = page.scroll_id {
            self.scroll_id = Some(id);
        }
        Ok(self.accept(page.hits))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.open_request = None;

        if let Some(scroll_id) = self.scroll_id.take() {
            self.backend
                .clear_scroll(&scroll_id)
                .await
                .map_err(FetchError::ScrollRelease)?;
            info!(
                "Released scroll cursor after {} hits ({} advances)",
                self.fetched, self.advances
            );
        }
        Ok(())
    }

    fn uses_cursor(&self) -> bool {
        true
    }

    fn opens_cursor(&self) -> bool {
        !self.closed && self.open_request.is_some()
    }
}

impl Drop for ScrollStreamingQuery {
    fn drop(&mut self) {
        let Some(scroll_id) = self.scroll_id.take() else {
            return;
        };

        debug!("ScrollStreamingQuery dropped without explicit close");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let backend = Arc::clone(&self.backend);
                handle.spawn(async move {
                    if let Err(e) = backend.clear_scroll(&scroll_id).await {
                        warn!("Failed to release dropped scroll cursor: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime to release scroll cursor '{}'", scroll_id),
        }
    }
}
