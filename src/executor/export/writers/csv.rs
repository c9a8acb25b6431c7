//! CSV serializer for export artifacts
//!
//! Renders projected records as CSV text with a header row. A field is
//! wrapped in double quotes only when it contains a comma, and with Excel
//! sanitization enabled a text field starting with `=`, `+`, `-` or `@` is
//! prefixed with an apostrophe before quoting.

use tracing::debug;

use crate::executor::export::projection::{BLANK, Cell, FlatRecord};

const FORMULA_PREFIXES: [char; 4] = ['=', '+', '-', '@'];

/// Serializer for CSV text
pub struct CsvSerializer {
    /// Apostrophe-prefix values that a spreadsheet would read as formulas
    excel_sanitize: bool,
}

impl CsvSerializer {
    /// Create a new CSV serializer
    ///
    /// # Arguments
    /// * `excel_sanitize` - Whether to neutralize formula-like values
    pub fn new(excel_sanitize: bool) -> Self {
        Self { excel_sanitize }
    }

    /// Render records as CSV text
    ///
    /// Returns an empty string for no records and never ends with a newline.
    pub fn serialize(&self, records: &[FlatRecord]) -> String {
        if records.is_empty() {
            return String::new();
        }

        let headers = collect_headers(records);
        let mut lines = Vec::with_capacity(records.len() + 1);
        lines.push(
            headers
                .iter()
                .map(|h| quote(h.to_string()))
                .collect::<Vec<_>>()
                .join(","),
        );

        for record in records {
            let row = headers
                .iter()
                .map(|h| match record.get(h) {
                    Some(cell) => self.format_cell(cell),
                    None => BLANK.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
            lines.push(row);
        }

        debug!(
            "Serialized {} rows with {} columns",
            records.len(),
            headers.len()
        );
        lines.join("\n")
    }

    fn format_cell(&self, cell: &Cell) -> String {
        let value = match cell {
            Cell::Text(s) if self.excel_sanitize && s.starts_with(FORMULA_PREFIXES) => {
                format!("'{s}")
            }
            other => other.as_str().to_string(),
        };
        quote(value)
    }
}

/// Union of record columns in first-seen order
fn collect_headers(records: &[FlatRecord]) -> Vec<&str> {
    let mut headers: Vec<&str> = Vec::new();
    for column in records.iter().flat_map(FlatRecord::columns) {
        if !headers.contains(&column) {
            headers.push(column);
        }
    }
    headers
}

fn quote(value: String) -> String {
    if value.contains(',') {
        format!("\"{value}\"")
    } else {
        value
    }
}

/// Render `records` as CSV text.
pub fn serialize(records: &[FlatRecord], excel_sanitize: bool) -> String {
    CsvSerializer::new(excel_sanitize).serialize(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn gender_record(category: &str, gender: Cell) -> FlatRecord {
        [("category", text(category)), ("customer_gender", gender)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_comma_values_are_quoted() {
        let records = [gender_record(",c1", text("Ma,le"))];
        assert_eq!(
            serialize(&records, true),
            "category,customer_gender\n\",c1\",\"Ma,le\""
        );
    }

    #[test]
    fn test_excel_sanitize_on() {
        let records = [
            gender_record("c1", text("=Male")),
            gender_record("c2", text("+Ma,le")),
            gender_record("c3", text("@SUM(A1)")),
            gender_record("c4", text("-1+2")),
        ];
        assert_eq!(
            serialize(&records, true),
            "category,customer_gender\nc1,'=Male\nc2,\"'+Ma,le\"\nc3,'@SUM(A1)\nc4,'-1+2"
        );
    }

    #[test]
    fn test_excel_sanitize_off() {
        let records = [
            gender_record("c1", text("=Male")),
            gender_record("c2", text("+Ma,le")),
        ];
        assert_eq!(
            serialize(&records, false),
            "category,customer_gender\nc1,=Male\nc2,\"+Ma,le\""
        );
    }

    #[test]
    fn test_null_is_blank_placeholder() {
        let records = [gender_record("c3", Cell::Blank)];
        assert_eq!(serialize(&records, true), "category,customer_gender\nc3, ");
    }

    #[test]
    fn test_negative_numbers_are_not_sanitized() {
        let records: [FlatRecord; 1] = [[("lon", Cell::Number("-0.1".into()))].into_iter().collect()];
        assert_eq!(serialize(&records, true), "lon\n-0.1");
    }

    #[test]
    fn test_missing_leaf_keeps_alignment() {
        let first: FlatRecord = [
            ("geoip.country_iso_code", text("GB")),
            ("geoip.location.lon", Cell::Number("-0.1".into())),
            ("geoip.location.lat", Cell::Number("51.5".into())),
        ]
        .into_iter()
        .collect();
        let second: FlatRecord = [
            ("geoip.country_iso_code", text("US")),
            ("geoip.city_name", text("New York")),
            ("geoip.location.lon", Cell::Number("-74".into())),
            ("geoip.location.lat", Cell::Number("40.8".into())),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            serialize(&[first, second], true),
            "geoip.country_iso_code,geoip.location.lon,geoip.location.lat,geoip.city_name\n\
             GB,-0.1,51.5, \n\
             US,-74,40.8,New York"
        );
    }

    #[test]
    fn test_empty_records() {
        assert_eq!(serialize(&[], true), "");
    }

    #[test]
    fn test_other_special_characters_are_not_quoted() {
        let records = [gender_record("say \"hi\"", text("a;b"))];
        assert_eq!(
            serialize(&records, true),
            "category,customer_gender\nsay \"hi\",a;b"
        );
    }
}
