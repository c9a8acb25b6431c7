//! Export execution engine
//!
//! This module turns a saved-search id plus request parameters into a named
//! CSV artifact:
//! - saved-search lookup through a [`SavedObjectStore`]
//! - validation into an immutable [`ExportSpec`]
//! - the compile / plan / fetch / project / serialize pipeline in [`export`]
//! - artifact naming for the delivery layer

pub mod export;
pub mod result;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{ExportError, Result};
use crate::saved_search::{ExportRequest, ExportSpec, SavedObjectStore};
use crate::search::{EngineClient, SearchBackend};

pub use export::ExportCoordinator;
pub use result::{ExportOutcome, PhaseTimings, ReportArtifact};

use export::coordinator::DEFAULT_KEEP_ALIVE;
use export::writers::artifact_file_name;

/// Runs saved-search exports end to end.
///
/// Cheap to share: each call to [`export`](Self::export) builds its own
/// spec and coordinator, so independent exports may run concurrently.
pub struct ExportExecutor {
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn SavedObjectStore>,
    keep_alive: String,
    show_progress: bool,
    cancel_token: Option<CancellationToken>,
    deadline: Option<Duration>,
}

impl ExportExecutor {
    /// Create an executor over a search backend and a saved-object store
    pub fn new(backend: Arc<dyn SearchBackend>, store: Arc<dyn SavedObjectStore>) -> Self {
        Self {
            backend,
            store,
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
            show_progress: false,
            cancel_token: None,
            deadline: None,
        }
    }

    /// Create an executor that uses one engine client for both roles
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(EngineClient::new(&config.engine).map_err(|e| {
            ExportError::Generic(format!("Failed to create engine client: {e}"))
        })?);

        Ok(Self::new(client.clone(), client)
            .with_keep_alive(config.engine.scroll_keep_alive.clone())
            .with_progress(config.export.show_progress))
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Export a saved search
    ///
    /// # Arguments
    /// * `saved_search_id` - Id of the saved search object
    /// * `request` - Time range, row limit and sanitize flag
    /// * `report_name` - Name used for the artifact; defaults to the saved search title
    ///
    /// # Returns
    /// * `Result<ReportArtifact>` - Named artifact, empty-bodied when nothing matched
    pub async fn export(
        &self,
        saved_search_id: &str,
        request: &ExportRequest,
        report_name: Option<&str>,
    ) -> Result<ReportArtifact> {
        if self.cancel_token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ExportError::Cancelled);
        }

        let descriptor = self.store.get_saved_search(saved_search_id).await?;
        let spec = ExportSpec::new(saved_search_id, &descriptor, request)?;

        let mut outcome = self.coordinator().execute(&spec).await?;
        let body = std::mem::take(&mut outcome.body);

        let name = report_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&descriptor.title);
        let file_name = artifact_file_name(&file_safe(name), Utc::now());
        info!("Generated artifact '{}' ({} bytes)", file_name, body.len());

        Ok(ReportArtifact {
            file_name,
            body,
            outcome,
        })
    }

    fn coordinator(&self) -> ExportCoordinator {
        let mut coordinator = ExportCoordinator::new(Arc::clone(&self.backend))
            .with_keep_alive(self.keep_alive.clone())
            .with_progress(self.show_progress);
        if let Some(token) = &self.cancel_token {
            coordinator = coordinator.with_cancellation(token.clone());
        }
        if let Some(deadline) = self.deadline {
            coordinator = coordinator.with_deadline(deadline);
        }
        coordinator
    }
}

/// Replace path separators so a report name is a single file name.
fn file_safe(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return "report".to_string();
    }
    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::executor::export::testing::MockBackend;
    use crate::saved_search::SavedSearchDescriptor;
    use crate::saved_search::tests::descriptor;
    use crate::search::RawHit;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    struct MockStore {
        descriptor: SavedSearchDescriptor,
    }

    #[async_trait]
    impl SavedObjectStore for MockStore {
        async fn get_saved_search(&self, id: &str) -> Result<SavedSearchDescriptor> {
            if id == "search-1" {
                Ok(self.descriptor.clone())
            } else {
                Err(LookupError::NotFound(id.to_string()).into())
            }
        }
    }

    fn executor(backend: Arc<MockBackend>) -> ExportExecutor {
        let store = Arc::new(MockStore {
            descriptor: descriptor(&["category", "customer_gender"]),
        });
        ExportExecutor::new(backend, store)
    }

    fn request() -> ExportRequest {
        ExportRequest::new(
            Utc.timestamp_millis_opt(0).unwrap(),
            Utc.timestamp_millis_opt(1_000).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_export_produces_named_artifact() {
        let backend = Arc::new(MockBackend::with_hits(
            vec![RawHit::from_source(json!({ "category": "c1", "customer_gender": "+Ma,le" }))],
            10,
        ));

        let artifact = assert_ok!(executor(backend).export("search-1", &request(), None).await);

        assert!(artifact.file_name.starts_with("Show category and gender_"));
        assert!(artifact.file_name.ends_with(".csv"));
        assert_eq!(artifact.body, "category,customer_gender\nc1,\"'+Ma,le\"");
        assert!(artifact.outcome.body.is_empty());
        assert_eq!(artifact.outcome.records_exported, 1);
    }

    #[tokio::test]
    async fn test_export_sanitize_off_and_report_name() {
        let backend = Arc::new(MockBackend::with_hits(
            vec![RawHit::from_source(json!({ "category": "c1", "customer_gender": "=Male" }))],
            10,
        ));

        let artifact = executor(backend)
            .export("search-1", &request().with_excel_sanitize(false), Some("daily/ecommerce"))
            .await
            .unwrap();

        assert!(artifact.file_name.starts_with("daily_ecommerce_"));
        assert_eq!(artifact.body, "category,customer_gender\nc1,=Male");
    }

    #[tokio::test]
    async fn test_empty_export_returns_empty_body() {
        let artifact = executor(Arc::new(MockBackend::new(0, 10)))
            .export("search-1", &request(), Some("empty"))
            .await
            .unwrap();

        assert_eq!(artifact.body, "");
        assert_eq!(artifact.outcome.matching_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_saved_search() {
        let backend = Arc::new(MockBackend::new(3, 10));
        let result = executor(backend.clone())
            .export("missing", &request(), None)
            .await;

        assert!(matches!(
            result,
            Err(ExportError::Lookup(LookupError::NotFound(id))) if id == "missing"
        ));
        assert_eq!(backend.calls().count, 0);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_querying() {
        let backend = Arc::new(MockBackend::new(3, 10));
        let result = executor(backend.clone())
            .export("search-1", &request().with_limit(0), None)
            .await;

        assert_err!(&result);
        assert!(matches!(result, Err(ExportError::Compile(_))));
        assert_eq!(backend.calls().window, 0);
    }

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe(" a/b\\c "), "a_b_c");
        assert_eq!(file_safe("  "), "report");
    }
}
