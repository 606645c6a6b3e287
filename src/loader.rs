use crate::error::ApiError;
use crate::value::CellValue;
use std::collections::HashMap;

/// Parsed CSV content: the header-derived column names and one data map per
/// row. Everything is stored as a string at upload time; types are inferred
/// later from samples.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, CellValue>>,
}

/// Parse uploaded CSV text.
///
/// The first non-empty line is the header row; columns with an empty name
/// are dropped, and so are the values under them. Data rows shorter than
/// the header leave the missing columns absent; extra trailing fields are
/// ignored. Empty lines are skipped. Quoted fields may contain commas and
/// doubled quotes; embedded newlines are not supported.
pub fn parse_csv(text: &str) -> Result<ParsedCsv, ApiError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| ApiError::invalid("CSV file is empty or invalid"))?;

    // Keep the header positions of usable columns so data fields stay
    // aligned after empty names are dropped.
    let header_fields = split_csv_line(header);
    let keep: Vec<(usize, String)> = header_fields
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.trim().is_empty())
        .map(|(i, name)| (i, name.trim().to_string()))
        .collect();

    if keep.is_empty() {
        return Err(ApiError::invalid("CSV header row has no usable columns"));
    }

    let columns: Vec<String> = keep.iter().map(|(_, name)| name.clone()).collect();

    let mut rows = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let mut data = HashMap::new();
        for (position, name) in &keep {
            if let Some(value) = fields.get(*position) {
                data.insert(name.clone(), CellValue::from(value.clone()));
            }
        }
        rows.push(data);
    }

    if rows.is_empty() {
        return Err(ApiError::invalid("CSV file is empty or invalid"));
    }

    Ok(ParsedCsv { columns, rows })
}

// Split one CSV line into fields, honoring quotes and doubled quotes
fn split_csv_line(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' && in_quotes {
                        // Doubled quote inside a quoted field: literal quote
                        current_field.push('"');
                        chars.next();
                    } else {
                        in_quotes = !in_quotes;
                    }
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(current_field);
                current_field = String::new();
            }
            _ => {
                current_field.push(c);
            }
        }
    }

    result.push(current_field);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_rows_map_by_column_name() {
        let parsed = parse_csv("name,age\nalice,30\nbob,25\n").unwrap();
        assert_eq!(parsed.columns, vec!["name", "age"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.rows[0].get("name"),
            Some(&CellValue::from("alice"))
        );
        assert_eq!(parsed.rows[1].get("age"), Some(&CellValue::from("25")));
    }

    #[test]
    fn quoted_fields_keep_commas_and_doubled_quotes() {
        let parsed = parse_csv("a,b\n\"x, y\",\"he said \"\"hi\"\"\"\n").unwrap();
        assert_eq!(parsed.rows[0].get("a"), Some(&CellValue::from("x, y")));
        assert_eq!(
            parsed.rows[0].get("b"),
            Some(&CellValue::from("he said \"hi\""))
        );
    }

    #[test]
    fn empty_header_names_are_dropped_with_their_values() {
        let parsed = parse_csv("a,,c\n1,2,3\n").unwrap();
        assert_eq!(parsed.columns, vec!["a", "c"]);
        assert_eq!(parsed.rows[0].get("a"), Some(&CellValue::from("1")));
        assert_eq!(parsed.rows[0].get("c"), Some(&CellValue::from("3")));
        assert_eq!(parsed.rows[0].len(), 2);
    }

    #[test]
    fn short_rows_leave_columns_absent() {
        let parsed = parse_csv("a,b,c\n1,2\n").unwrap();
        assert_eq!(parsed.rows[0].len(), 2);
        assert!(!parsed.rows[0].contains_key("c"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let parsed = parse_csv("a\n\n1\n\n2\n").unwrap();
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(parse_csv("").is_err());
        assert!(parse_csv("a,b\n").is_err());
        assert!(parse_csv(",,\n1,2\n").is_err());
    }
}
