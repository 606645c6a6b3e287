use csvhub::chart::{ChartKind, available_chart_kinds, build_chart_data, select_chart_kind};
use csvhub::dataset::Row;
use csvhub::summary::{ColumnType, summarize};
use csvhub::value::CellValue;
use std::collections::HashMap;

// Helper function to build single-column sample rows
fn sample(column: &str, values: &[&str]) -> Vec<Row> {
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

// Type inference drives the whole analysis view; walk the three outcomes
fn test_type_inference() {
    println!("\n====== Testing type inference ======");

    let rows = sample("score", &["10", "20.5", "30"]);
    let stats = summarize(&rows, &["score".to_string()]);
    let score = &stats["score"];
    assert_eq!(score.column_type, ColumnType::Numeric);
    let numeric = score.numeric.as_ref().unwrap();
    assert_eq!(numeric.min, 10.0);
    assert_eq!(numeric.max, 30.0);
    println!("✓ Fully parseable column inferred numeric");

    let rows = sample("score", &["10", "20.5", "n/a"]);
    let stats = summarize(&rows, &["score".to_string()]);
    assert_eq!(stats["score"].column_type, ColumnType::Textual);
    println!("✓ A single unparseable value forces textual");

    let rows = sample("day", &["2024-03-01", "2024-03-02"]);
    let stats = summarize(&rows, &["day".to_string()]);
    assert_eq!(stats["day"].column_type, ColumnType::Date);
    println!("✓ Consistent dates inferred date-like");
}

// The analysis page flow: infer, pick a chart kind, build the series
fn test_chart_flow() {
    println!("\n====== Testing chart flow ======");

    let rows = sample("grade", &["a", "a", "a", "b", "b", "c"]);
    let stats = summarize(&rows, &["grade".to_string()]);
    let grade = &stats["grade"];

    let kinds = available_chart_kinds(grade);
    assert_eq!(kinds, vec![ChartKind::Bar, ChartKind::Pie]);
    println!("✓ Low-cardinality textual column offers Bar and Pie");

    // a previous Line selection is no longer valid after a column change
    let kind = select_chart_kind(Some(ChartKind::Line), &kinds).unwrap();
    assert_eq!(kind, ChartKind::Bar);
    println!("✓ Stale selection falls back to the first available kind");

    let points = build_chart_data(&rows, "grade", grade, kind);
    let series: Vec<(String, f64)> = points
        .iter()
        .map(|p| (p.label.clone(), p.value))
        .collect();
    assert_eq!(
        series,
        vec![
            ("a".to_string(), 3.0),
            ("b".to_string(), 2.0),
            ("c".to_string(), 1.0)
        ]
    );
    println!("✓ Bar series counts sorted descending");

    let numbers: Vec<String> = (0..12).map(|i| (i * 10).to_string()).collect();
    let refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
    let rows = sample("n", &refs);
    let stats = summarize(&rows, &["n".to_string()]);
    let points = build_chart_data(&rows, "n", &stats["n"], ChartKind::Bar);
    assert_eq!(points.len(), 5);
    let total: usize = points.iter().filter_map(|p| p.count).sum();
    assert_eq!(total, 12);
    assert_eq!(points[4].count, Some(3));
    println!("✓ Histogram keeps every value, maximum included, in 5 bins");
}

fn main() {
    test_type_inference();
    test_chart_flow();
    println!("\nAll summary tests passed!");
}
