//! Saved searches and export specifications
//!
//! A saved search is resolved once per export request into a
//! [`SavedSearchDescriptor`], then combined with the request's time range,
//! row limit and sanitize flag into an immutable [`ExportSpec`] that is passed
//! explicitly through every export stage.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::{CompileError, LookupError, Result};
use crate::filter::FilterSet;
use crate::search::{EngineClient, SortDirection, SortField};

/// Column name that stands for "the whole document".
const SOURCE_COLUMN: &str = "_source";

/// Everything the exporter needs to know about a saved search.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSearchDescriptor {
    pub title: String,
    /// Selected columns in display order; empty means all fields.
    pub columns: Vec<String>,
    pub sort: Vec<SortField>,
    /// Stored search-source JSON (free-text query and filters).
    pub search_source_json: String,
    pub index_pattern: String,
    pub time_field_name: Option<String>,
    pub date_fields: Vec<String>,
}

/// Source of saved-search descriptors.
#[async_trait]
pub trait SavedObjectStore: Send + Sync {
    async fn get_saved_search(&self, id: &str) -> Result<SavedSearchDescriptor>;
}

/// Caller-supplied parameters of one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: Option<u64>,
    pub excel_sanitize: bool,
}

impl ExportRequest {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            limit: None,
            excel_sanitize: true,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_excel_sanitize(mut self, enabled: bool) -> Self {
        self.excel_sanitize = enabled;
        self
    }
}

/// Immutable description of one export, built fresh per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpec {
    saved_search_id: String,
    index_pattern_name: String,
    time_field_name: Option<String>,
    selected_columns: Vec<String>,
    sort_spec: Vec<SortField>,
    filter_set: FilterSet,
    date_fields: BTreeSet<String>,
    limit: Option<u64>,
    time_range_start: DateTime<Utc>,
    time_range_end: DateTime<Utc>,
    excel_sanitize: bool,
}

impl ExportSpec {
    /// Validate a request against a resolved saved search.
    ///
    /// Fails with a compilation error if the stored filters cannot be
    /// parsed, the limit is zero or the time range is inverted.
    pub fn new(
        saved_search_id: impl Into<String>,
        descriptor: &SavedSearchDescriptor,
        request: &ExportRequest,
    ) -> Result<Self> {
        if let Some(0) = request.limit {
            return Err(CompileError::InvalidLimit(0).into());
        }
        if request.start > request.end {
            return Err(CompileError::InvalidTimeRange {
                start: request.start.timestamp_millis(),
                end: request.end.timestamp_millis(),
            }
            .into());
        }

        let filter_set = FilterSet::from_search_source(&descriptor.search_source_json)?;

        Ok(Self {
            saved_search_id: saved_search_id.into(),
            index_pattern_name: descriptor.index_pattern.clone(),
            time_field_name: descriptor.time_field_name.clone().filter(|f| !f.is_empty()),
            selected_columns: descriptor.columns.clone(),
            sort_spec: descriptor.sort.clone(),
            filter_set,
            date_fields: descriptor.date_fields.iter().cloned().collect(),
            limit: request.limit,
            time_range_start: request.start,
            time_range_end: request.end,
            excel_sanitize: request.excel_sanitize,
        })
    }

    pub fn saved_search_id(&self) -> &str {
        &self.saved_search_id
    }

    pub fn index_pattern_name(&self) -> &str {
        &self.index_pattern_name
    }

    pub fn time_field_name(&self) -> Option<&str> {
        self.time_field_name.as_deref()
    }

    pub fn selected_columns(&self) -> &[String] {
        &self.selected_columns
    }

    pub fn sort_spec(&self) -> &[SortField] {
        &self.sort_spec
    }

    pub fn filter_set(&self) -> &FilterSet {
        &self.filter_set
    }

    pub fn date_fields(&self) -> &BTreeSet<String> {
        &self.date_fields
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.time_range_start, self.time_range_end)
    }

    pub fn excel_sanitize(&self) -> bool {
        self.excel_sanitize
    }

    /// `_source` include patterns for the data query.
    ///
    /// A selected column may name a leaf at any depth, so each column is
    /// requested as itself, as a nested leaf and as a nested parent. Date
    /// fields are always included. `None` when all fields are exported.
    pub fn source_includes(&self) -> Option<Vec<String>> {
        if self.selected_columns.is_empty() {
            return None;
        }

        let mut includes = Vec::new();
        for column in &self.selected_columns {
            includes.push(column.clone());
            includes.push(format!("{column}.*"));
            includes.push(format!("*.{column}"));
            includes.push(format!("*.{column}.*"));
        }
        includes.extend(self.date_fields.iter().cloned());
        Some(includes)
    }
}

/* ========================= Saved-object parsing ========================= */

impl SavedSearchDescriptor {
    /// Build a descriptor from a `search` saved object and the index pattern
    /// it references (both as the `_source` of their documents).
    pub fn from_saved_objects(search: &Value, index_pattern: &Value) -> Result<Self> {
        let attrs = search
            .get("search")
            .ok_or_else(|| LookupError::InvalidDescriptor("missing 'search' attributes".into()))?;

        let search_source_json = attrs
            .pointer("/kibanaSavedObjectMeta/searchSourceJSON")
            .and_then(Value::as_str)
            .ok_or_else(|| LookupError::InvalidDescriptor("missing searchSourceJSON".into()))?
            .to_string();

        let pattern = index_pattern.get("index-pattern").ok_or_else(|| {
            LookupError::IndexPatternNotFound("missing 'index-pattern' attributes".into())
        })?;

        let index_pattern_title = pattern
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| LookupError::IndexPatternNotFound("index pattern has no title".into()))?
            .to_string();

        Ok(Self {
            title: attrs
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            columns: parse_columns(attrs.get("columns")),
            sort: parse_sort(attrs.get("sort")),
            search_source_json,
            index_pattern: index_pattern_title,
            time_field_name: pattern
                .get("timeFieldName")
                .and_then(Value::as_str)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
            date_fields: parse_date_fields(pattern.get("fields"))?,
        })
    }
}

/// Id of the index pattern a `search` saved object points at.
///
/// The search source names its reference through `indexRefName`.
pub fn index_pattern_ref(search: &Value) -> Result<String> {
    let source_json = search
        .pointer("/search/kibanaSavedObjectMeta/searchSourceJSON")
        .and_then(Value::as_str)
        .ok_or_else(|| LookupError::InvalidDescriptor("missing searchSourceJSON".into()))?;

    let source: Value = serde_json::from_str(source_json)
        .map_err(|e| CompileError::MalformedFilter(e.to_string()))?;
    let ref_name = source.get("indexRefName").and_then(Value::as_str).ok_or_else(|| {
        LookupError::IndexPatternNotFound("search source has no indexRefName".into())
    })?;

    search
        .get("references")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|r| r.get("name").and_then(Value::as_str) == Some(ref_name))
        .and_then(|r| r.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| LookupError::IndexPatternNotFound(format!("no reference named '{ref_name}'")).into())
}

fn parse_columns(columns: Option<&Value>) -> Vec<String> {
    columns
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|c| *c != SOURCE_COLUMN)
        .map(str::to_string)
        .collect()
}

/// Accepts `[[field, dir], ...]` and the older single `[field, dir]` form.
fn parse_sort(sort: Option<&Value>) -> Vec<SortField> {
    let Some(Value::Array(entries)) = sort else {
        return Vec::new();
    };

    let pair = |entry: &[Value]| -> Option<SortField> {
        let field = entry.first()?.as_str()?;
        let direction = entry.get(1).and_then(Value::as_str).unwrap_or("asc");
        Some(SortField::new(field, SortDirection::parse(direction)))
    };

    if entries.first().is_some_and(Value::is_string) {
        return pair(entries.as_slice()).into_iter().collect();
    }

    entries
        .iter()
        .filter_map(Value::as_array)
        .filter_map(|entry| pair(entry.as_slice()))
        .collect()
}

/// Names of all `date` fields in an index pattern's stored field list.
fn parse_date_fields(fields: Option<&Value>) -> Result<Vec<String>> {
    let parsed;
    let list = match fields {
        Some(Value::String(s)) => {
            parsed = serde_json::from_str::<Value>(s).map_err(|e| {
                LookupError::InvalidDescriptor(format!("index pattern fields: {e}"))
            })?;
            &parsed
        }
        Some(other) => other,
        None => return Ok(Vec::new()),
    };

    Ok(list
        .as_array()
        .into_iter()
        .flatten()
        .filter(|f| f.get("type").and_then(Value::as_str) == Some("date"))
        .filter_map(|f| f.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

#[async_trait]
impl SavedObjectStore for EngineClient {
    async fn get_saved_search(&self, id: &str) -> Result<SavedSearchDescriptor> {
        let index = self.saved_objects_index().to_string();

        let search = self
            .get_document(&index, &format!("search:{id}"))
            .await
            .map_err(LookupError::Engine)?
            .and_then(|doc| doc.get("_source").cloned())
            .ok_or_else(|| LookupError::NotFound(id.to_string()))?;

        let pattern_id = index_pattern_ref(&search)?;
        debug!("Saved search '{}' uses index pattern '{}'", id, pattern_id);

        let pattern = self
            .get_document(&index, &format!("index-pattern:{pattern_id}"))
            .await
            .map_err(LookupError::Engine)?
            .and_then(|doc| doc.get("_source").cloned())
            .ok_or_else(|| LookupError::IndexPatternNotFound(pattern_id.clone()))?;

        SavedSearchDescriptor::from_saved_objects(&search, &pattern)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    pub(crate) fn descriptor(columns: &[&str]) -> SavedSearchDescriptor {
        SavedSearchDescriptor {
            title: "Show category and gender".into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            sort: vec![],
            search_source_json: r#"{"query":{"query":"","language":"kuery"},"filter":[]}"#.into(),
            index_pattern: "kibana_sample_data_ecommerce".into(),
            time_field_name: Some("order_date".into()),
            date_fields: vec!["order_date".into()],
        }
    }

    fn saved_search_object() -> Value {
        json!({
            "type": "search",
            "search": {
                "title": "Show category and gender",
                "columns": ["category", "customer_gender"],
                "sort": [["order_date", "desc"]],
                "kibanaSavedObjectMeta": {
                    "searchSourceJSON": "{\"highlightAll\":true,\"version\":true,\"query\":{\"query\":\"\",\"language\":\"kuery\"},\"indexRefName\":\"kibanaSavedObjectMeta.searchSourceJSON.index\",\"filter\":[]}"
                }
            },
            "references": [{
                "name": "kibanaSavedObjectMeta.searchSourceJSON.index",
                "type": "index-pattern",
                "id": "ff959d40-b880-11e8-a6d9-e546fe2bba5f"
            }]
        })
    }

    fn index_pattern_object() -> Value {
        json!({
            "index-pattern": {
                "title": "kibana_sample_data_ecommerce",
                "timeFieldName": "order_date",
                "fields": "[{\"name\":\"category\",\"type\":\"string\"},{\"name\":\"order_date\",\"type\":\"date\"},{\"name\":\"products.created_on\",\"type\":\"date\"}]"
            }
        })
    }

    #[test]
    fn test_index_pattern_ref() {
        assert_eq!(
            index_pattern_ref(&saved_search_object()).unwrap(),
            "ff959d40-b880-11e8-a6d9-e546fe2bba5f"
        );

        let mut broken = saved_search_object();
        broken["references"] = json!([]);
        assert!(index_pattern_ref(&broken).is_err());
    }

    #[test]
    fn test_descriptor_from_saved_objects() {
        let d = SavedSearchDescriptor::from_saved_objects(&saved_search_object(), &index_pattern_object())
            .unwrap();

        assert_eq!(d.title, "Show category and gender");
        assert_eq!(d.columns, vec!["category", "customer_gender"]);
        assert_eq!(d.sort, vec![SortField::new("order_date", SortDirection::Desc)]);
        assert_eq!(d.index_pattern, "kibana_sample_data_ecommerce");
        assert_eq!(d.time_field_name.as_deref(), Some("order_date"));
        assert_eq!(d.date_fields, vec!["order_date", "products.created_on"]);
    }

    #[test]
    fn test_source_only_columns_mean_all() {
        assert!(parse_columns(Some(&json!(["_source"]))).is_empty());
    }

    #[test]
    fn test_legacy_single_sort_pair() {
        assert_eq!(
            parse_sort(Some(&json!(["order_date", "asc"]))),
            vec![SortField::new("order_date", SortDirection::Asc)]
        );
        assert!(parse_sort(Some(&json!([]))).is_empty());
    }

    #[test]
    fn test_spec_validation() {
        let start = Utc.timestamp_millis_opt(1_343_576_635_300).unwrap();
        let end = Utc.timestamp_millis_opt(1_596_037_435_301).unwrap();
        let d = descriptor(&["category"]);

        let spec = ExportSpec::new("id", &d, &ExportRequest::new(start, end).with_limit(10)).unwrap();
        assert_eq!(spec.limit(), Some(10));
        assert!(spec.excel_sanitize());
        assert_eq!(spec.time_field_name(), Some("order_date"));
        assert!(spec.date_fields().contains("order_date"));

        assert!(ExportSpec::new("id", &d, &ExportRequest::new(start, end).with_limit(0)).is_err());
        assert!(ExportSpec::new("id", &d, &ExportRequest::new(end, start)).is_err());

        let mut bad = d.clone();
        bad.search_source_json = "not json".into();
        assert!(matches!(
            ExportSpec::new("id", &bad, &ExportRequest::new(start, end)),
            Err(crate::error::ExportError::Compile(CompileError::MalformedFilter(_)))
        ));
    }

    #[test]
    fn test_source_includes() {
        let start = Utc.timestamp_millis_opt(0).unwrap();
        let spec = ExportSpec::new("id", &descriptor(&["city_name"]), &ExportRequest::new(start, start))
            .unwrap();
        assert_eq!(
            spec.source_includes().unwrap(),
            vec!["city_name", "city_name.*", "*.city_name", "*.city_name.*", "order_date"]
        );

        let all = ExportSpec::new("id", &descriptor(&[]), &ExportRequest::new(start, start)).unwrap();
        assert!(all.source_includes().is_none());
    }
}
