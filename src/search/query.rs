//! Engine-agnostic boolean query tree
//!
//! The filter compiler produces this tree; only [`super::dsl`] knows how it
//! looks on the wire.

use chrono::{DateTime, Utc};

/// A node of the compiled query.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineQuery {
    /// Boolean container (AND / NOT / OR groups).
    Bool(BoolQuery),

    /// Exact phrase match on a field.
    MatchPhrase { field: String, value: String },

    /// Field-existence predicate.
    Exists { field: String },

    /// Free-text query in the engine's query-string grammar.
    QueryString { query: String },

    /// Inclusive range on a time field, compared as epoch milliseconds.
    Range { field: String, gte: i64, lte: i64 },
}

/// Boolean container.
///
/// `should` is an OR group; with `minimum_should_match` set, at least that
/// many of its clauses have to match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<EngineQuery>,
    pub must_not: Vec<EngineQuery>,
    pub should: Vec<EngineQuery>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(&mut self, query: EngineQuery) -> &mut Self {
        self.must.push(query);
        self
    }

    pub fn must_not(&mut self, query: EngineQuery) -> &mut Self {
        self.must_not.push(query);
        self
    }

    /// OR group of `alternatives` with at least one required match.
    pub fn any_of(alternatives: Vec<EngineQuery>) -> EngineQuery {
        EngineQuery::Bool(BoolQuery {
            should: alternatives,
            minimum_should_match: Some(1),
            ..Default::default()
        })
    }

    /// True when no clause constrains the result (matches everything).
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty() && self.should.is_empty()
    }
}

impl EngineQuery {
    pub fn match_phrase(field: impl Into<String>, value: impl Into<String>) -> Self {
        EngineQuery::MatchPhrase {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        EngineQuery::Exists {
            field: field.into(),
        }
    }

    pub fn time_range(field: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        EngineQuery::Range {
            field: field.into(),
            gte: start.timestamp_millis(),
            lte: end.timestamp_millis(),
        }
    }

    /// Borrow the root boolean container, if this is one.
    pub fn as_bool(&self) -> Option<&BoolQuery> {
        match self {
            EngineQuery::Bool(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_uses_epoch_millis() {
        let start = Utc.timestamp_millis_opt(1_343_576_635_300).unwrap();
        let end = Utc.timestamp_millis_opt(1_596_037_435_301).unwrap();

        let range = EngineQuery::time_range("order_date", start, end);
        assert_eq!(
            range,
            EngineQuery::Range {
                field: "order_date".into(),
                gte: 1_343_576_635_300,
                lte: 1_596_037_435_301,
            }
        );
    }

    #[test]
    fn test_any_of_requires_one_match() {
        let group = BoolQuery::any_of(vec![EngineQuery::match_phrase("a", "x")]);
        let inner = group.as_bool().unwrap();
        assert_eq!(inner.minimum_should_match, Some(1));
        assert!(inner.must.is_empty());
    }
}
