//! Row projector
//!
//! Reduces raw hits to flat, single-level records keyed by dotted field path.
//! Nested objects are flattened; arrays and empty objects are kept whole as
//! compact JSON. Date fields are replaced by their doc-value rendering in the
//! display format `MM/DD/YYYY h:mm:ss am`.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::ProjectionError;
use crate::search::RawHit;

/// Placeholder for null leaves and absent columns.
pub const BLANK: &str = " ";

const DISPLAY_DATE_FORMAT: &str = "%m/%d/%Y %-I:%M:%S %P";

const DOCVALUE_DATE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// A projected field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    /// Numeric leaf; never sanitized as a formula.
    Number(String),
    Blank,
}

impl Cell {
    pub fn as_str(&self) -> &str {
        match self {
            Cell::Text(s) | Cell::Number(s) => s,
            Cell::Blank => BLANK,
        }
    }

    fn from_leaf(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Blank,
            Value::String(s) => Cell::Text(s.clone()),
            Value::Number(n) => Cell::Number(n.to_string()),
            Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// One output row: dotted paths in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    cells: Vec<(String, Cell)>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `path`, keeping its original position if already present.
    pub fn insert(&mut self, path: impl Into<String>, cell: Cell) {
        let path = path.into();
        match self.cells.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => *existing = cell,
            None => self.cells.push((path, cell)),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Cell> {
        self.cells.iter().find(|(p, _)| p == path).map(|(_, c)| c)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Cell)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (S, Cell)>>(iter: I) -> Self {
        let mut record = FlatRecord::new();
        for (path, cell) in iter {
            record.insert(path, cell);
        }
        record
    }
}

/// Project hits onto the selected columns (all leaves when empty).
pub fn project(
    hits: &[RawHit],
    selected_columns: &[String],
    date_fields: &BTreeSet<String>,
) -> Result<Vec<FlatRecord>, ProjectionError> {
    hits.iter()
        .map(|hit| project_hit(hit, selected_columns, date_fields))
        .collect()
}

fn project_hit(
    hit: &RawHit,
    selected_columns: &[String],
    date_fields: &BTreeSet<String>,
) -> Result<FlatRecord, ProjectionError> {
    let empty = Map::new();
    let source = match &hit.source {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ProjectionError::InvalidDocument(format!(
                "hit {} has a non-object _source: {}",
                hit.id.as_deref().unwrap_or("<unknown>"),
                other
            )));
        }
    };

    let mut leaves = Vec::new();
    flatten(source, None, &mut leaves);

    let mut record = if selected_columns.is_empty() {
        leaves.into_iter().collect::<FlatRecord>()
    } else {
        let mut record = FlatRecord::new();
        for column in selected_columns {
            for (path, cell) in leaves.iter().filter(|(p, _)| path_matches(p, column)) {
                if record.get(path).is_none() {
                    record.insert(path.clone(), cell.clone());
                }
            }
        }
        record
    };

    for field in date_fields {
        if record.get(field).is_none() {
            continue;
        }
        if let Some(rendered) = hit.docvalue(field) {
            record.insert(field.clone(), Cell::Text(format_date(field, rendered)?));
        }
    }

    Ok(record)
}

fn flatten(object: &Map<String, Value>, prefix: Option<&str>, out: &mut Vec<(String, Cell)>) {
    for (key, value) in object {
        let path = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => flatten(nested, Some(&path), out),
            leaf => out.push((path, Cell::from_leaf(leaf))),
        }
    }
}

/// A selected column names a path segment at any depth.
fn path_matches(path: &str, column: &str) -> bool {
    path == column
        || path.starts_with(&format!("{column}."))
        || path.ends_with(&format!(".{column}"))
        || path.contains(&format!(".{column}."))
}

fn format_date(field: &str, rendered: &Value) -> Result<String, ProjectionError> {
    let invalid = || ProjectionError::InvalidDate {
        field: field.to_string(),
        value: rendered.to_string(),
    };
    let text = rendered.as_str().ok_or_else(invalid)?;

    let parsed = DOCVALUE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
        .ok_or_else(invalid)?;

    Ok(parsed.format(DISPLAY_DATE_FORMAT).to_string())
}
