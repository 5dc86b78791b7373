//! Minimal CSV tokenizer
//!
//! Newline-delimited records, comma-separated fields, first line is the
//! header. Double quotes wrap a field that contains commas; `""` inside a
//! quoted field is a literal quote. Records never span lines, so a quote
//! still open at the end of a line is flagged on that record.

use std::collections::BTreeMap;

/// One tokenized line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CsvRecord {
    pub values: Vec<String>,
    /// The last value opened a quote that the line never closed
    pub unterminated: bool,
}

/// Header plus raw data records
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CsvTable {
    /// Lowercased, trimmed header names
    pub headers: Vec<String>,
    pub records: Vec<CsvRecord>,
}

impl CsvTable {
    /// Parse text into a table. Returns `None` when there is no header line.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let headers = split_record(lines.next()?)
            .values
            .into_iter()
            .map(|h| h.to_lowercase())
            .collect();
        let records = lines.map(split_record).collect();

        Some(Self { headers, records })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Zip a record with the header names.
    ///
    /// Missing trailing values default to empty; extra values are dropped.
    pub fn field_map(&self, record: &CsvRecord) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record.values.get(i).cloned().unwrap_or_default();
                (header.clone(), value)
            })
            .collect()
    }

    /// Column whose quote was left open, if the record has one.
    ///
    /// Values past the last header have no column name and report as `row`.
    pub fn unterminated_column(&self, record: &CsvRecord) -> Option<String> {
        if !record.unterminated {
            return None;
        }
        let column = record
            .values
            .len()
            .checked_sub(1)
            .and_then(|i| self.headers.get(i))
            .cloned()
            .unwrap_or_else(|| "row".to_string());
        Some(column)
    }
}

/// Split one line into trimmed field values
pub(crate) fn split_record(line: &str) -> CsvRecord {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            // A quote only opens a quoted section at the start of a field
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    CsvRecord {
        values: fields,
        unterminated: in_quotes,
    }
}

/// Quote a value if it needs quoting
pub(crate) fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render one record
pub(crate) fn join_record(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| escape_field(value))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_record() {
        assert_eq!(split_record("a, b ,c").values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_trailing_empty_field() {
        assert_eq!(split_record("a,b,").values, vec!["a", "b", ""]);
    }

    #[test]
    fn test_split_quoted_field_with_commas() {
        let record = split_record(r#"Jane,"{""cms_edit"": true, ""lms_view"": false}",x"#);
        assert!(!record.unterminated);
        assert_eq!(
            record.values,
            vec!["Jane", r#"{"cms_edit": true, "lms_view": false}"#, "x"]
        );
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        assert_eq!(split_record(r#"ab"c,d"#).values, vec![r#"ab"c"#, "d"]);
    }

    #[test]
    fn test_escape_roundtrip() {
        let value = r#"{"a": 1, "b": "x"}"#;
        let line = join_record(&["plain", value]);
        assert_eq!(split_record(&line).values, vec!["plain", value]);
    }

    #[test]
    fn test_parse_table_skips_blank_lines_and_crlf() {
        let table = CsvTable::parse("Name, EMAIL\r\n\r\nJane,jane@school.edu\r\n   \r\n").unwrap();
        assert_eq!(table.headers, vec!["name", "email"]);
        assert_eq!(table.records.len(), 1);
        assert!(table.has_column("email"));
    }

    #[test]
    fn test_parse_empty_text() {
        assert!(CsvTable::parse("").is_none());
        assert!(CsvTable::parse("\n \n").is_none());
    }

    #[test]
    fn test_field_map_pads_missing_values() {
        let table = CsvTable::parse("name,email,phone\nJane").unwrap();
        let map = table.field_map(&table.records[0]);
        assert_eq!(map["name"], "Jane");
        assert_eq!(map["email"], "");
        assert_eq!(map["phone"], "");
    }

    #[test]
    fn test_quote_left_open_at_end_of_line() {
        let text = concat!(
            "name,email,permissions\n",
            r#"Jane,j@x.io,"{""cms_edit"": true,"#,
            "\n",
            r#"""lms_view"": false}""#,
            "\n",
        );
        let table = CsvTable::parse(text).unwrap();
        assert_eq!(table.records.len(), 2);
        assert!(table.records[0].unterminated);
        assert_eq!(
            table.unterminated_column(&table.records[0]).as_deref(),
            Some("permissions")
        );
        assert_eq!(table.unterminated_column(&table.records[1]), None);
    }

    #[test]
    fn test_open_quote_past_last_header() {
        let table = CsvTable::parse("name\nJane,\"extra\n").unwrap();
        assert_eq!(
            table.unterminated_column(&table.records[0]).as_deref(),
            Some("row")
        );
    }
}
