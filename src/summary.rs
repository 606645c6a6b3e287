use crate::dataset::Row;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Rows fed into `summarize` by the transport layer are capped at this many;
/// statistics are sample estimates, not dataset-exact.
pub const SAMPLE_LIMIT: usize = 100;

// Unique-value reporting thresholds for textual columns
const UNIQUE_LIST_CEILING: usize = 20;
const UNIQUE_SAMPLE_SIZE: usize = 10;

lazy_static! {
    // Cheap shape check before handing candidates to chrono
    static ref DATE_SHAPE: Regex =
        Regex::new(r"^\d{1,4}[-/]\d{1,2}[-/]\d{1,4}([T ].*)?$").unwrap();
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Coarse column type inferred from sampled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Date,
    Textual,
}

/// Aggregates over the parsed numbers of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Cardinality information for a textual column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStats {
    #[serde(rename = "uniqueCount")]
    pub unique_count: usize,

    /// Up to ten distinct values, present only when the cardinality is
    /// between 2 and 19. First-seen order; not semantically meaningful.
    #[serde(rename = "sampleValues", skip_serializing_if = "Option::is_none")]
    pub sample_values: Option<Vec<String>>,
}

/// Per-column descriptive statistics over a row sample. Ephemeral: computed
/// per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    #[serde(rename = "dataType")]
    pub column_type: ColumnType,

    /// Number of non-null, non-empty values in the sample
    pub count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextStats>,
}

/// Compute per-column statistics over a row sample.
///
/// Pure: same sample and column list always yields identical stats. Type
/// inference runs in priority order, first full match wins: numeric when
/// every non-empty value parses as a finite number, else date-like when
/// every value parses as a calendar date, else textual. Date-like columns
/// report only their count in the baseline behavior.
pub fn summarize(rows: &[Row], columns: &[String]) -> HashMap<String, ColumnStats> {
    let mut stats = HashMap::with_capacity(columns.len());
    for column in columns {
        let values: Vec<String> = rows
            .iter()
            .filter_map(|row| row.data.get(column))
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect();
        stats.insert(column.clone(), column_stats(&values));
    }
    stats
}

fn column_stats(values: &[String]) -> ColumnStats {
    let count = values.len();

    if count > 0 {
        let numbers: Vec<f64> = values
            .iter()
            .filter_map(|v| parse_finite_number(v))
            .collect();
        if numbers.len() == count {
            return ColumnStats {
                column_type: ColumnType::Numeric,
                count,
                numeric: Some(numeric_stats(&numbers)),
                text: None,
            };
        }

        if values.iter().all(|v| parses_as_date(v)) {
            return ColumnStats {
                column_type: ColumnType::Date,
                count,
                numeric: None,
                text: None,
            };
        }
    }

    ColumnStats {
        column_type: ColumnType::Textual,
        count,
        numeric: None,
        text: Some(text_stats(values)),
    }
}

fn numeric_stats(numbers: &[f64]) -> NumericStats {
    let sum: f64 = numbers.iter().sum();
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    NumericStats {
        mean: sum / numbers.len() as f64,
        min,
        max,
    }
}

fn text_stats(values: &[String]) -> TextStats {
    let mut seen = HashSet::new();
    let mut in_order = Vec::new();
    for value in values {
        if seen.insert(value.as_str()) {
            in_order.push(value.clone());
        }
    }

    let unique_count = in_order.len();
    let sample_values = if unique_count > 1 && unique_count < UNIQUE_LIST_CEILING {
        in_order.truncate(UNIQUE_SAMPLE_SIZE);
        Some(in_order)
    } else {
        None
    };

    TextStats {
        unique_count,
        sample_values,
    }
}

fn parse_finite_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Calendar-date check against a fixed format list. The regex rejects the
/// bulk of non-dates cheaply; chrono validates the rest.
fn parses_as_date(value: &str) -> bool {
    let value = value.trim();
    if !DATE_SHAPE.is_match(value) {
        return false;
    }
    DATE_FORMATS
        .iter()
        .any(|format| NaiveDate::parse_from_str(value, format).is_ok())
        || value.parse::<chrono::NaiveDateTime>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    fn rows(column: &str, values: &[&str]) -> Vec<Row> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Row {
                id: format!("r{}", i),
                row_index: i,
                data: HashMap::from([(column.to_string(), CellValue::from(*v))]),
            })
            .collect()
    }

    fn stats_for(values: &[&str]) -> ColumnStats {
        let rows = rows("c", values);
        summarize(&rows, &["c".to_string()])
            .remove("c")
            .expect("column present")
    }

    #[test]
    fn all_parseable_values_infer_numeric() {
        let stats = stats_for(&["1", "2.5", " 3 ", "-4"]);
        assert_eq!(stats.column_type, ColumnType::Numeric);
        assert_eq!(stats.count, 4);
        let numeric = stats.numeric.unwrap();
        assert_eq!(numeric.min, -4.0);
        assert_eq!(numeric.max, 3.0);
        assert!((numeric.mean - 0.625).abs() < 1e-12);
    }

    #[test]
    fn one_bad_value_breaks_numeric_inference() {
        let stats = stats_for(&["5", "3", "x"]);
        assert_eq!(stats.column_type, ColumnType::Textual);
        assert!(stats.numeric.is_none());
    }

    #[test]
    fn consistent_dates_infer_date_like_with_count_only() {
        let stats = stats_for(&["2023-01-05", "2023-11-30", "1999/12/31"]);
        assert_eq!(stats.column_type, ColumnType::Date);
        assert_eq!(stats.count, 3);
        assert!(stats.numeric.is_none());
        assert!(stats.text.is_none());
    }

    #[test]
    fn impossible_calendar_dates_fall_back_to_textual() {
        let stats = stats_for(&["2023-02-30", "2023-01-01"]);
        assert_eq!(stats.column_type, ColumnType::Textual);
    }

    #[test]
    fn empty_and_null_values_are_excluded_from_count() {
        let mut all = rows("c", &["a", "", "b"]);
        all.push(Row {
            id: "rn".to_string(),
            row_index: 3,
            data: HashMap::from([("c".to_string(), CellValue::Null)]),
        });
        let stats = summarize(&all, &["c".to_string()]).remove("c").unwrap();
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn column_missing_from_all_rows_is_textual_zero() {
        let all = rows("c", &["a"]);
        let stats = summarize(&all, &["other".to_string()])
            .remove("other")
            .unwrap();
        assert_eq!(stats.column_type, ColumnType::Textual);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.text.unwrap().unique_count, 0);
    }

    #[test]
    fn unique_values_reported_only_for_mid_cardinality() {
        // single distinct value: no sample list
        let stats = stats_for(&["a", "a"]);
        let text = stats.text.unwrap();
        assert_eq!(text.unique_count, 1);
        assert!(text.sample_values.is_none());

        // three distinct values: sample list present
        let stats = stats_for(&["a", "b", "c", "x1"]);
        let text = stats.text.unwrap();
        assert_eq!(text.unique_count, 4);
        let sample = text.sample_values.unwrap();
        assert_eq!(sample.len(), 4);

        // 25 distinct values: cardinality too high for a list
        let many: Vec<String> = (0..25).map(|i| format!("v{}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let stats = stats_for(&refs);
        let text = stats.text.unwrap();
        assert_eq!(text.unique_count, 25);
        assert!(text.sample_values.is_none());
    }

    #[test]
    fn sample_list_is_capped_at_ten() {
        let many: Vec<String> = (0..15).map(|i| format!("v{}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let stats = stats_for(&refs);
        let text = stats.text.unwrap();
        assert_eq!(text.unique_count, 15);
        assert_eq!(text.sample_values.unwrap().len(), 10);
    }

    #[test]
    fn summarize_is_pure() {
        let all = rows("c", &["1", "2", "3"]);
        let columns = vec!["c".to_string()];
        assert_eq!(summarize(&all, &columns), summarize(&all, &columns));
    }
}
