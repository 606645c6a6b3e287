use crate::dataset::Row;
use crate::summary::{ColumnStats, ColumnType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Histogram sizing bounds: clamp(ceil(sqrt(N)), MIN_BINS, MAX_BINS)
const MIN_BINS: usize = 5;
const MAX_BINS: usize = 10;

// Category bars are cut to the most frequent values; pies are not
const BAR_CATEGORY_LIMIT: usize = 20;

// Pie charts stay readable only at low cardinality
const PIE_UNIQUE_CEILING: usize = 15;

/// Chart kinds selectable per column, depending on inferred type and
/// cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Histogram for numeric columns, frequency bars for textual ones
    Bar,
    /// Sorted-value distribution curve (rank index on the x axis)
    Line,
    /// Category shares, only for low-cardinality textual columns
    Pie,
}

impl ChartKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            "pie" => Some(ChartKind::Pie),
            _ => None,
        }
    }
}

/// One labeled aggregate point of a chart series.
///
/// `value` carries the series value: the bin mean for histograms, the cell
/// value for line charts, the frequency count for category bars and pies.
/// Histogram points additionally report how many values fell in the bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Chart kinds available for a column with the given statistics.
pub fn available_chart_kinds(stats: &ColumnStats) -> Vec<ChartKind> {
    match stats.column_type {
        ColumnType::Numeric => vec![ChartKind::Bar, ChartKind::Line],
        ColumnType::Textual => {
            let unique = stats.text.as_ref().map(|t| t.unique_count).unwrap_or(0);
            let mut kinds = Vec::new();
            if unique > 1 {
                kinds.push(ChartKind::Bar);
                if unique < PIE_UNIQUE_CEILING {
                    kinds.push(ChartKind::Pie);
                }
            }
            kinds
        }
        ColumnType::Date => Vec::new(),
    }
}

/// Keep the current selection while it stays available; otherwise fall back
/// to the first available kind, or none.
pub fn select_chart_kind(
    current: Option<ChartKind>,
    available: &[ChartKind],
) -> Option<ChartKind> {
    match current {
        Some(kind) if available.contains(&kind) => Some(kind),
        _ => available.first().copied(),
    }
}

/// Build the aggregate series for one column and chart kind.
///
/// Returns an empty vector when the sample holds no usable values for the
/// kind ("no chart data"); the caller distinguishes that from "no column
/// selected".
pub fn build_chart_data(
    rows: &[Row],
    column: &str,
    stats: &ColumnStats,
    kind: ChartKind,
) -> Vec<ChartPoint> {
    match (stats.column_type, kind) {
        (ColumnType::Numeric, ChartKind::Bar) => histogram(&numeric_values(rows, column)),
        (ColumnType::Numeric, ChartKind::Line) => sorted_line(numeric_values(rows, column)),
        (ColumnType::Textual, ChartKind::Bar) => {
            category_counts(text_values(rows, column), Some(BAR_CATEGORY_LIMIT))
        }
        (ColumnType::Textual, ChartKind::Pie) => category_counts(text_values(rows, column), None),
        _ => Vec::new(),
    }
}

fn numeric_values(rows: &[Row], column: &str) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| row.data.get(column))
        .filter(|v| !v.is_empty())
        .filter_map(|v| v.as_number())
        .collect()
}

fn text_values(rows: &[Row], column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.data.get(column))
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

/// Equal-width histogram. Bin count is clamp(ceil(sqrt(N)), 5, 10); every
/// value lands in a bin (the maximum is absorbed by the last one) and each
/// bin reports its count and the mean of its members.
fn histogram(values: &[f64]) -> Vec<ChartPoint> {
    if values.is_empty() {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let bin_count = ((values.len() as f64).sqrt().ceil() as usize).clamp(MIN_BINS, MAX_BINS);
    let bin_width = (max - min) / bin_count as f64;

    let mut counts = vec![0usize; bin_count];
    let mut sums = vec![0f64; bin_count];
    for &value in values {
        // all-equal samples have zero width; everything belongs to bin 0
        let index = if bin_width > 0.0 {
            (((value - min) / bin_width).floor() as usize).min(bin_count - 1)
        } else {
            0
        };
        counts[index] += 1;
        sums[index] += value;
    }

    (0..bin_count)
        .map(|i| {
            let low = min + i as f64 * bin_width;
            let high = min + (i + 1) as f64 * bin_width;
            ChartPoint {
                label: format!("{:.2} - {:.2}", low, high),
                value: if counts[i] > 0 {
                    sums[i] / counts[i] as f64
                } else {
                    0.0
                },
                count: Some(counts[i]),
            }
        })
        .collect()
}

/// Values sorted ascending against their rank index: a distribution curve,
/// not a time series.
fn sorted_line(mut values: Vec<f64>) -> Vec<ChartPoint> {
    values.sort_by(f64::total_cmp);
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| ChartPoint {
            label: index.to_string(),
            value,
            count: None,
        })
        .collect()
}

/// Frequency count per distinct value, descending. Ties break on the label
/// so the series is deterministic.
fn category_counts(values: Vec<String>, limit: Option<usize>) -> Vec<ChartPoint> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    entries
        .into_iter()
        .map(|(label, count)| ChartPoint {
            label,
            value: count as f64,
            count: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::summarize;
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

    fn stats(rows: &[Row], column: &str) -> ColumnStats {
        summarize(rows, &[column.to_string()]).remove(column).unwrap()
    }

    #[test]
    fn kinds_for_numeric_columns() {
        let all = rows("n", &["1", "2", "3"]);
        let s = stats(&all, "n");
        assert_eq!(available_chart_kinds(&s), vec![ChartKind::Bar, ChartKind::Line]);
    }

    #[test]
    fn kinds_for_textual_columns_depend_on_cardinality() {
        let all = rows("t", &["a", "a", "a", "b", "b", "c"]);
        let s = stats(&all, "t");
        assert_eq!(available_chart_kinds(&s), vec![ChartKind::Bar, ChartKind::Pie]);

        // single distinct value: nothing to chart
        let all = rows("t", &["a", "a"]);
        let s = stats(&all, "t");
        assert!(available_chart_kinds(&s).is_empty());

        // 15 distinct values: bar only
        let many: Vec<String> = (0..15).map(|i| format!("v{:02}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let all = rows("t", &refs);
        let s = stats(&all, "t");
        assert_eq!(available_chart_kinds(&s), vec![ChartKind::Bar]);
    }

    #[test]
    fn date_like_columns_have_no_kinds() {
        let all = rows("d", &["2023-01-01", "2023-01-02"]);
        let s = stats(&all, "d");
        assert!(available_chart_kinds(&s).is_empty());
    }

    #[test]
    fn selection_keeps_valid_kind_and_reselects_otherwise() {
        let available = vec![ChartKind::Bar, ChartKind::Line];
        assert_eq!(
            select_chart_kind(Some(ChartKind::Line), &available),
            Some(ChartKind::Line)
        );
        assert_eq!(
            select_chart_kind(Some(ChartKind::Pie), &available),
            Some(ChartKind::Bar)
        );
        assert_eq!(select_chart_kind(None, &available), Some(ChartKind::Bar));
        assert_eq!(select_chart_kind(Some(ChartKind::Bar), &[]), None);
    }

    #[test]
    fn histogram_bin_count_follows_sqrt_clamp() {
        // 12 values, min 0, max 110: ceil(sqrt(12)) = 4 -> clamped to 5 bins
        let values: Vec<String> = vec![
            "0", "10", "20", "30", "40", "50", "60", "70", "80", "90", "100", "110",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let all = rows("n", &refs);
        let s = stats(&all, "n");

        let points = build_chart_data(&all, "n", &s, ChartKind::Bar);
        assert_eq!(points.len(), 5);

        // bin width 22; the maximum lands in the last bin, not out of range
        let counts: Vec<usize> = points.iter().map(|p| p.count.unwrap()).collect();
        assert_eq!(counts.iter().sum::<usize>(), 12);
        assert_eq!(counts, vec![3, 2, 2, 2, 3]);
        assert_eq!(points[0].label, "0.00 - 22.00");

        // 100 values: ceil(sqrt(100)) = 10 stays within the cap
        let many: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let all = rows("n", &refs);
        let s = stats(&all, "n");
        assert_eq!(build_chart_data(&all, "n", &s, ChartKind::Bar).len(), 10);
    }

    #[test]
    fn histogram_bin_means_cover_members() {
        let all = rows("n", &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
        let s = stats(&all, "n");
        let points = build_chart_data(&all, "n", &s, ChartKind::Bar);
        // ceil(sqrt(10)) = 4 -> 5 bins of width 1.8; members are contiguous
        let total: usize = points.iter().map(|p| p.count.unwrap()).sum();
        assert_eq!(total, 10);
        assert_eq!(points[0].count, Some(2));
        assert_eq!(points[0].value, 0.5);
    }

    #[test]
    fn all_equal_values_fill_the_first_bin() {
        let all = rows("n", &["7", "7", "7"]);
        let s = stats(&all, "n");
        let points = build_chart_data(&all, "n", &s, ChartKind::Bar);
        assert_eq!(points.len(), 5);
        assert_eq!(points[0].count, Some(3));
        assert_eq!(points[0].value, 7.0);
        assert_eq!(points.iter().filter_map(|p| p.count).sum::<usize>(), 3);
    }

    #[test]
    fn line_is_a_sorted_distribution_curve() {
        let all = rows("n", &["5", "1", "3"]);
        let s = stats(&all, "n");
        let points = build_chart_data(&all, "n", &s, ChartKind::Line);
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0, 5.0]);
        let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "1", "2"]);
    }

    #[test]
    fn textual_bar_counts_sorted_descending() {
        let all = rows("t", &["a", "a", "a", "b", "b", "c"]);
        let s = stats(&all, "t");
        let points = build_chart_data(&all, "t", &s, ChartKind::Bar);
        let series: Vec<(&str, f64)> =
            points.iter().map(|p| (p.label.as_str(), p.value)).collect();
        assert_eq!(series, vec![("a", 3.0), ("b", 2.0), ("c", 1.0)]);
    }

    #[test]
    fn count_sums_match_the_non_empty_sample() {
        let all = rows("t", &["a", "a", "b", "", "c", "c", "c"]);
        let s = stats(&all, "t");
        for kind in [ChartKind::Bar, ChartKind::Pie] {
            let points = build_chart_data(&all, "t", &s, kind);
            let sum: f64 = points.iter().map(|p| p.value).sum();
            assert_eq!(sum, 6.0);
        }
    }

    #[test]
    fn bar_truncates_to_top_twenty_but_pie_does_not() {
        let mut values: Vec<String> = (0..25).map(|i| format!("v{:02}", i)).collect();
        values.push("v00".to_string()); // make one value dominant
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let all = rows("t", &refs);
        let s = stats(&all, "t");

        let bar = build_chart_data(&all, "t", &s, ChartKind::Bar);
        assert_eq!(bar.len(), 20);
        assert_eq!(bar[0].label, "v00");
        assert_eq!(bar[0].value, 2.0);

        let pie = build_chart_data(&all, "t", &s, ChartKind::Pie);
        assert_eq!(pie.len(), 25);
    }

    #[test]
    fn empty_input_yields_no_chart_data() {
        let all = rows("t", &["", ""]);
        let s = stats(&all, "t");
        assert!(build_chart_data(&all, "t", &s, ChartKind::Bar).is_empty());

        let none: Vec<Row> = Vec::new();
        let s = summarize(&none, &["t".to_string()]).remove("t").unwrap();
        assert!(build_chart_data(&none, "t", &s, ChartKind::Bar).is_empty());
    }
}
