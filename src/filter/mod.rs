//! Saved-search filter model
//!
//! A saved search stores its filters and free-text query as a JSON string
//! (the "search source"). This module turns that string into a typed
//! [`FilterSet`]; [`compiler`] turns a `FilterSet` into an engine query.

pub mod compiler;

use serde::Deserialize;
use serde_json::Value;

use crate::error::CompileError;

pub use compiler::compile;

/// Structured filters plus the free-text query of a saved search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub clauses: Vec<FilterClause>,
    /// Free text in the reduced `and` / `or` / `not` grammar.
    pub query: String,
}

/// One stored filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub negate: bool,
    pub disabled: bool,
    pub kind: FilterKind,
}

/// Clause-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// Field matches a single phrase.
    Phrase { value: String },
    /// Field is present.
    Exists,
    /// Field matches any of several phrases.
    Phrases { values: Vec<String> },
}

#[derive(Deserialize)]
struct RawSearchSource {
    #[serde(default)]
    query: Option<RawQuery>,
    #[serde(default)]
    filter: Vec<RawFilter>,
}

#[derive(Deserialize)]
struct RawQuery {
    #[serde(default)]
    query: Value,
}

#[derive(Deserialize)]
struct RawFilter {
    meta: RawFilterMeta,
}

#[derive(Deserialize)]
struct RawFilterMeta {
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    negate: bool,
    #[serde(rename = "type")]
    kind: String,
    key: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    value: Value,
}

impl FilterSet {
    /// Parse the stored search-source JSON of a saved search.
    pub fn from_search_source(json: &str) -> Result<Self, CompileError> {
        let raw: RawSearchSource =
            serde_json::from_str(json).map_err(|e| CompileError::MalformedFilter(e.to_string()))?;

        let query = match raw.query.map(|q| q.query) {
            Some(Value::String(s)) => s,
            // Lucene-syntax saved searches may store a match_all object here.
            Some(Value::Null) | Some(Value::Object(_)) | None => String::new(),
            Some(other) => {
                return Err(CompileError::MalformedFilter(format!(
                    "query text must be a string, got {other}"
                )));
            }
        };

        let clauses = raw
            .filter
            .into_iter()
            .map(|f| FilterClause::from_meta(f.meta))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { clauses, query })
    }

    /// Clauses that take part in compilation.
    pub fn enabled(&self) -> impl Iterator<Item = &FilterClause> {
        self.clauses.iter().filter(|c| !c.disabled)
    }
}

impl FilterClause {
    fn from_meta(meta: RawFilterMeta) -> Result<Self, CompileError> {
        let kind = match meta.kind.as_str() {
            "phrase" => FilterKind::Phrase {
                value: param_query(&meta.params).ok_or_else(|| {
                    CompileError::MalformedFilter(format!(
                        "phrase filter on '{}' has no params.query",
                        meta.key
                    ))
                })?,
            },
            "exists" => FilterKind::Exists,
            "phrases" => FilterKind::Phrases {
                values: phrase_alternatives(&meta)?,
            },
            other => return Err(CompileError::UnknownFilterKind(other.to_string())),
        };

        Ok(Self {
            field: meta.key,
            negate: meta.negate,
            disabled: meta.disabled,
            kind,
        })
    }
}

/// Alternatives of a `phrases` filter.
///
/// Prefers the `params` array; otherwise splits the display value on `", "`,
/// falling back to `params.query` for a single alternative.
fn phrase_alternatives(meta: &RawFilterMeta) -> Result<Vec<String>, CompileError> {
    if let Value::Array(values) = &meta.params {
        return Ok(values.iter().map(value_text).collect());
    }

    match meta.value.as_str() {
        Some(value) if value.contains(',') => Ok(value.split(", ").map(str::to_string).collect()),
        _ => param_query(&meta.params)
            .or_else(|| meta.value.as_str().map(str::to_string))
            .map(|v| vec![v])
            .ok_or_else(|| {
                CompileError::MalformedFilter(format!(
                    "phrases filter on '{}' has no values",
                    meta.key
                ))
            }),
    }
}

fn param_query(params: &Value) -> Option<String> {
    params.get("query").filter(|v| !v.is_null()).map(value_text)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_search_source() {
        let json = r#"{"highlightAll":true,"version":true,"query":{"query":"","language":"kuery"},"indexRefName":"kibanaSavedObjectMeta.searchSourceJSON.index","filter":[]}"#;
        let set = FilterSet::from_search_source(json).unwrap();
        assert!(set.clauses.is_empty());
        assert_eq!(set.query, "");
    }

    #[test]
    fn test_parse_all_kinds() {
        let json = r#"{
            "query": {"query": "category:shoes and not currency:USD", "language": "kuery"},
            "filter": [
                {"meta": {"disabled": false, "negate": false, "type": "phrase", "key": "customer_gender", "params": {"query": "MALE"}}},
                {"meta": {"disabled": false, "negate": true, "type": "exists", "key": "geoip.city_name", "value": "exists"}},
                {"meta": {"disabled": true, "negate": false, "type": "phrases", "key": "day_of_week", "value": "Monday, Friday", "params": {}}},
                {"meta": {"disabled": false, "negate": false, "type": "phrase", "key": "day_of_week_i", "params": {"query": 4}}}
            ]
        }"#;

        let set = FilterSet::from_search_source(json).unwrap();
        assert_eq!(set.query, "category:shoes and not currency:USD");
        assert_eq!(set.clauses.len(), 4);
        assert_eq!(
            set.clauses[0].kind,
            FilterKind::Phrase { value: "MALE".into() }
        );
        assert!(set.clauses[1].negate);
        assert_eq!(set.clauses[1].kind, FilterKind::Exists);
        assert_eq!(
            set.clauses[2].kind,
            FilterKind::Phrases {
                values: vec!["Monday".into(), "Friday".into()]
            }
        );
        assert_eq!(set.clauses[3].kind, FilterKind::Phrase { value: "4".into() });
        assert_eq!(set.enabled().count(), 3);
    }

    #[test]
    fn test_phrases_prefers_params_array() {
        let json = r#"{"filter": [{"meta": {"type": "phrases", "key": "sku", "params": ["A", "B", "C"], "value": "A, B, C"}}]}"#;
        let set = FilterSet::from_search_source(json).unwrap();
        assert_eq!(
            set.clauses[0].kind,
            FilterKind::Phrases {
                values: vec!["A".into(), "B".into(), "C".into()]
            }
        );
    }

    #[test]
    fn test_single_phrases_value_uses_params_query() {
        let json = r#"{"filter": [{"meta": {"type": "phrases", "key": "sku", "params": {"query": "ZO0549"}, "value": "ZO0549"}}]}"#;
        let set = FilterSet::from_search_source(json).unwrap();
        assert_eq!(
            set.clauses[0].kind,
            FilterKind::Phrases {
                values: vec!["ZO0549".into()]
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let json = r#"{"filter": [{"meta": {"type": "range", "key": "price", "params": {"gte": 1}}}]}"#;
        assert!(matches!(
            FilterSet::from_search_source(json),
            Err(CompileError::UnknownFilterKind(kind)) if kind == "range"
        ));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            FilterSet::from_search_source("{\"filter\": ["),
            Err(CompileError::MalformedFilter(_))
        ));
        assert!(matches!(
            FilterSet::from_search_source(r#"{"filter": [{"meta": {"type": "phrase", "key": "a"}}]}"#),
            Err(CompileError::MalformedFilter(_))
        ));
    }
}
