//! Rendering of [`EngineQuery`] and [`SearchRequest`] into the
//! Elasticsearch / OpenSearch query DSL.

use serde_json::{Map, Value, json};

use super::query::{BoolQuery, EngineQuery};
use super::{SearchRequest, SortDirection};

/// Doc-value format used to render date fields at minute precision.
pub const DATE_DOCVALUE_FORMAT: &str = "date_hour_minute";

/// Render a query node.
pub fn render_query(query: &EngineQuery) -> Value {
    match query {
        EngineQuery::Bool(b) => render_bool(b),
        EngineQuery::MatchPhrase { field, value } => {
            json!({ "match_phrase": { field.as_str(): { "query": value } } })
        }
        EngineQuery::Exists { field } => json!({ "exists": { "field": field } }),
        EngineQuery::QueryString { query } => json!({ "query_string": { "query": query } }),
        EngineQuery::Range { field, gte, lte } => json!({
            "range": {
                field.as_str(): { "gte": gte, "lte": lte, "format": "epoch_millis" }
            }
        }),
    }
}

fn render_bool(b: &BoolQuery) -> Value {
    let mut body = Map::new();
    for (key, clauses) in [("must", &b.must), ("must_not", &b.must_not), ("should", &b.should)] {
        if !clauses.is_empty() {
            body.insert(
                key.to_string(),
                Value::Array(clauses.iter().map(render_query).collect()),
            );
        }
    }
    if let Some(min) = b.minimum_should_match {
        body.insert("minimum_should_match".to_string(), json!(min));
    }
    json!({ "bool": body })
}

/// Body of a count request.
pub fn render_count(query: &EngineQuery) -> Value {
    json!({ "query": render_query(query) })
}

/// Body of a search or scroll-open request.
pub fn render_search(request: &SearchRequest) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), render_query(&request.query));
    body.insert("size".to_string(), json!(request.size));
    body.insert("version".to_string(), json!(true));

    if !request.sort.is_empty() {
        let sorts: Vec<Value> = request
            .sort
            .iter()
            .map(|s| {
                let order = match s.direction {
                    SortDirection::Asc => "asc",
                    SortDirection::Desc => "desc",
                };
                json!({ s.field.as_str(): { "order": order } })
            })
            .collect();
        body.insert("sort".to_string(), Value::Array(sorts));
    }

    if let Some(ref includes) = request.source_includes {
        body.insert("_source".to_string(), json!({ "includes": includes }));
    }

    if !request.docvalue_fields.is_empty() {
        let docvalues: Vec<Value> = request
            .docvalue_fields
            .iter()
            .map(|field| json!({ "field": field, "format": DATE_DOCVALUE_FORMAT }))
            .collect();
        body.insert("docvalue_fields".to_string(), Value::Array(docvalues));
    }

    Value::Object(body)
}
