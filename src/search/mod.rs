//! Search-engine boundary
//!
//! This module defines what the exporter needs from the backing search engine
//! and nothing more:
//! - [`EngineQuery`]: the compiled boolean query tree
//! - [`SearchRequest`] / [`SearchPage`] / [`RawHit`]: request and response shapes
//! - [`SearchBackend`]: count, window lookup, bounded search and scroll cursors
//!
//! [`EngineClient`] implements the trait over the Elasticsearch / OpenSearch
//! REST API; tests substitute in-memory backends.

pub mod client;
pub mod dsl;
pub mod query;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;

pub use client::EngineClient;
pub use query::{BoolQuery, EngineQuery};

/// Result alias for raw engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Sort direction of a saved-search column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a stored direction; anything but `desc` sorts ascending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// One `(field, direction)` entry of a sort spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// A data query: the compiled filter plus retrieval options.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: EngineQuery,
    pub sort: Vec<SortField>,
    /// Hits per response (whole result for a bounded search, batch size for a scroll).
    pub size: u64,
    /// `_source` include patterns; `None` returns the whole document.
    pub source_includes: Option<Vec<String>>,
    /// Fields to return as minute-precision doc values.
    pub docvalue_fields: Vec<String>,
}

/// A document as returned by the engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Value,
    /// Doc-value renderings, keyed by field path, each a list of values.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawHit {
    /// Hit with the given source and no doc values.
    pub fn from_source(source: Value) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    /// First doc-value rendering of `field`, if any.
    pub fn docvalue(&self, field: &str) -> Option<&Value> {
        match self.fields.get(field)? {
            Value::Array(values) => values.first(),
            other => Some(other),
        }
    }
}

/// One response page of hits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<RawHit>,
    /// Cursor handle when the page came from a scroll.
    pub scroll_id: Option<String>,
}

/// Operations the exporter issues against the search engine.
///
/// Every method is a suspension point of the export task; implementations
/// hold no exporter-side state between calls.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Smallest max-result-window across the indices `index_pattern` resolves to.
    async fn max_result_window(&self, index_pattern: &str) -> EngineResult<u64>;

    /// Number of documents matching `query`.
    async fn count(&self, index_pattern: &str, query: &EngineQuery) -> EngineResult<u64>;

    /// Single bounded search.
    async fn search(&self, index_pattern: &str, request: &SearchRequest) -> EngineResult<SearchPage>;

    /// Open a scroll cursor and return its first batch.
    async fn open_scroll(
        &self,
        index_pattern: &str,
        request: &SearchRequest,
        keep_alive: &str,
    ) -> EngineResult<SearchPage>;

    /// Advance an open scroll cursor by one batch.
    async fn scroll(&self, scroll_id: &str, keep_alive: &str) -> EngineResult<SearchPage>;

    /// Release a scroll cursor.
    async fn clear_scroll(&self, scroll_id: &str) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_hit_deserialize() {
        let hit: RawHit = serde_json::from_value(json!({
            "_id": "1",
            "_source": { "order_date": "2018-12-24T10:33:30+00:00" },
            "fields": { "order_date": ["2018-12-24T10:33"] }
        }))
        .unwrap();

        assert_eq!(hit.id.as_deref(), Some("1"));
        assert_eq!(hit.docvalue("order_date"), Some(&json!("2018-12-24T10:33")));
        assert_eq!(hit.docvalue("missing"), None);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("DESC"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("asc"), SortDirection::Asc);
        assert_eq!(SortDirection::parse(""), SortDirection::Asc);
    }
}
