//! Filter compiler
//!
//! Turns a [`FilterSet`] plus an absolute time range into a single boolean
//! [`EngineQuery`]:
//! - enabled `phrase` / `exists` clauses go to `must`, or `must_not` when negated
//! - a `phrases` clause always becomes an OR group (at least one alternative
//!   must match) under `must`, whatever its negation flag says; saved searches
//!   have always exported negated multi-value filters this way
//! - non-empty free text becomes a `query_string` clause with `and` / `or` /
//!   `not` normalized to the engine's uppercase operators
//! - a time field adds an inclusive epoch-millisecond range

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::error::CompileError;
use crate::search::{BoolQuery, EngineQuery};

use super::{FilterKind, FilterSet};

static BOOLEAN_OPERATORS: LazyLock<[(Regex, &'static str); 3]> = LazyLock::new(|| {
    [
        (Regex::new(r"(?i) and ").expect("valid regex"), " AND "),
        (Regex::new(r"(?i) or ").expect("valid regex"), " OR "),
        (Regex::new(r"(?i) not ").expect("valid regex"), " NOT "),
    ]
});

/// Compile a filter set and time range into one boolean query.
pub fn compile(
    filters: &FilterSet,
    time_field: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<EngineQuery, CompileError> {
    if start > end {
        return Err(CompileError::InvalidTimeRange {
            start: start.timestamp_millis(),
            end: end.timestamp_millis(),
        });
    }

    let mut root = BoolQuery::new();

    for clause in filters.enabled() {
        match &clause.kind {
            FilterKind::Phrase { value } => {
                let query = EngineQuery::match_phrase(&clause.field, value);
                if clause.negate {
                    root.must_not(query);
                } else {
                    root.must(query);
                }
            }
            FilterKind::Exists => {
                let query = EngineQuery::exists(&clause.field);
                if clause.negate {
                    root.must_not(query);
                } else {
                    root.must(query);
                }
            }
            FilterKind::Phrases { values } => {
                let alternatives = values
                    .iter()
                    .map(|v| EngineQuery::match_phrase(&clause.field, v))
                    .collect();
                root.must(BoolQuery::any_of(alternatives));
            }
        }
    }

    let text = normalize_free_text(&filters.query);
    if !text.trim().is_empty() {
        root.must(EngineQuery::QueryString { query: text });
    }

    if let Some(field) = time_field.filter(|f| !f.is_empty()) {
        root.must(EngineQuery::time_range(field, start, end));
    }

    debug!(
        "Compiled query: {} must, {} must_not",
        root.must.len(),
        root.must_not.len()
    );

    Ok(EngineQuery::Bool(root))
}

/// Rewrite ` and ` / ` or ` / ` not ` (any case) to the engine's operators.
pub fn normalize_free_text(text: &str) -> String {
    BOOLEAN_OPERATORS
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterClause;
    use chrono::TimeZone;

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.timestamp_millis_opt(1_000).unwrap(),
            Utc.timestamp_millis_opt(2_000).unwrap(),
        )
    }

    fn clause(field: &str, negate: bool, kind: FilterKind) -> FilterClause {
        FilterClause {
            field: field.into(),
            negate,
            disabled: false,
            kind,
        }
    }

    #[test]
    fn test_negation_routes_phrase_and_exists() {
        let filters = FilterSet {
            clauses: vec![
                clause("customer_gender", false, FilterKind::Phrase { value: "MALE".into() }),
                clause("currency", true, FilterKind::Phrase { value: "USD".into() }),
                clause("geoip.city_name", true, FilterKind::Exists),
                clause("email", false, FilterKind::Exists),
            ],
            query: String::new(),
        };
        let (start, end) = range();

        let query = compile(&filters, None, start, end).unwrap();
        let root = query.as_bool().unwrap();
        assert_eq!(
            root.must,
            vec![
                EngineQuery::match_phrase("customer_gender", "MALE"),
                EngineQuery::exists("email"),
            ]
        );
        assert_eq!(
            root.must_not,
            vec![
                EngineQuery::match_phrase("currency", "USD"),
                EngineQuery::exists("geoip.city_name"),
            ]
        );
    }

    #[test]
    fn test_phrases_is_disjunctive_even_when_negated() {
        let values = vec!["Monday".to_string(), "Friday".to_string()];
        let expected = BoolQuery::any_of(vec![
            EngineQuery::match_phrase("day_of_week", "Monday"),
            EngineQuery::match_phrase("day_of_week", "Friday"),
        ]);
        let (start, end) = range();

        for negate in [false, true] {
            let filters = FilterSet {
                clauses: vec![clause("day_of_week", negate, FilterKind::Phrases { values: values.clone() })],
                query: String::new(),
            };
            let query = compile(&filters, None, start, end).unwrap();
            let root = query.as_bool().unwrap();
            assert_eq!(root.must, vec![expected.clone()]);
            assert!(root.must_not.is_empty());
        }
    }

    #[test]
    fn test_disabled_clauses_are_skipped() {
        let mut disabled = clause("sku", false, FilterKind::Exists);
        disabled.disabled = true;
        let filters = FilterSet {
            clauses: vec![disabled],
            query: String::new(),
        };
        let (start, end) = range();

        let query = compile(&filters, Some(""), start, end).unwrap();
        assert!(query.as_bool().unwrap().is_empty());
    }

    #[test]
    fn test_free_text_and_time_range() {
        let filters = FilterSet {
            clauses: vec![],
            query: "category:shoes and not currency:EUR Or sku:x".into(),
        };
        let (start, end) = range();

        let query = compile(&filters, Some("order_date"), start, end).unwrap();
        let root = query.as_bool().unwrap();
        assert_eq!(
            root.must,
            vec![
                EngineQuery::QueryString {
                    query: "category:shoes AND NOT currency:EUR OR sku:x".into()
                },
                EngineQuery::Range {
                    field: "order_date".into(),
                    gte: 1_000,
                    lte: 2_000
                },
            ]
        );
    }

    #[test]
    fn test_operator_words_inside_terms_are_kept() {
        assert_eq!(normalize_free_text("brand:android"), "brand:android");
        assert_eq!(normalize_free_text("a AND b"), "a AND b");
        assert_eq!(normalize_free_text("cats and dogs"), "cats AND dogs");
    }

    #[test]
    fn test_inverted_time_range_is_error() {
        let (start, end) = range();
        let result = compile(&FilterSet::default(), Some("order_date"), end, start);
        assert!(matches!(result, Err(CompileError::InvalidTimeRange { .. })));
    }
}
