use csvhub::dataset::Dataset;
use csvhub::loader;
use csvhub::summary::{self, ColumnType};

use std::env;
use std::fs;

/// Inspect a CSV file from the command line: parse it and print the
/// per-column statistics the analysis view would show.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let Some(path) = args.get(1) else {
        eprintln!("usage: csvhub <file.csv>");
        std::process::exit(2);
    };

    let text = fs::read_to_string(path)?;
    let parsed = loader::parse_csv(&text)?;
    let dataset = Dataset::new(path, "local", parsed.columns, parsed.rows);

    println!(
        "{}: {} columns, {} rows",
        path,
        dataset.column_count(),
        dataset.row_count()
    );

    let sample: Vec<_> = dataset
        .rows
        .iter()
        .take(summary::SAMPLE_LIMIT)
        .cloned()
        .collect();
    let stats = summary::summarize(&sample, &dataset.column_names());

    for column in dataset.column_names() {
        let Some(s) = stats.get(&column) else { continue };
        match s.column_type {
            ColumnType::Numeric => {
                if let Some(n) = &s.numeric {
                    println!(
                        "  {:<20} numeric  count={} mean={:.2} min={} max={}",
                        column, s.count, n.mean, n.min, n.max
                    );
                }
            }
            ColumnType::Date => {
                println!("  {:<20} date     count={}", column, s.count);
            }
            ColumnType::Textual => {
                let unique = s.text.as_ref().map(|t| t.unique_count).unwrap_or(0);
                println!(
                    "  {:<20} textual  count={} unique={}",
                    column, s.count, unique
                );
            }
        }
    }

    Ok(())
}
