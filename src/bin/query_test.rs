use csvhub::dataset::{Caller, Dataset, Store};
use csvhub::query::{QueryOptions, SortDirection, query_rows, update_cell};
use csvhub::value::CellValue;
use std::collections::HashMap;

// Helper function to build a dataset from inline rows
fn build_dataset(columns: &[&str], rows: &[&[(&str, &str)]]) -> Dataset {
    let row_data = rows
        .iter()
        .map(|pairs| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
                .collect::<HashMap<_, _>>()
        })
        .collect();
    Dataset::new(
        "fixture",
        "alice",
        columns.iter().map(|c| c.to_string()).collect(),
        row_data,
    )
}

fn values(page: &csvhub::query::RowPage, column: &str) -> Vec<String> {
    page.rows
        .iter()
        .map(|r| r.data.get(column).map(|v| v.to_string()).unwrap_or_default())
        .collect()
}

// End-to-end walk over the row listing: filter, sort, then page through
fn test_filter_sort_paginate() {
    println!("\n====== Testing filter + sort + paginate ======");

    let dataset = build_dataset(
        &["city", "population"],
        &[
            &[("city", "Amsterdam"), ("population", "882000")],
            &[("city", "Rotterdam"), ("population", "656000")],
            &[("city", "Utrecht"), ("population", "361000")],
            &[("city", "Zaandam"), ("population", "156000")],
            &[("city", "Berlin"), ("population", "3769000")],
        ],
    );
    let id = dataset.id.clone();
    let mut store = Store::new();
    store.insert(dataset);
    let alice = Caller::new("alice", None);

    let options = QueryOptions {
        page_size: 2,
        sort_column: Some("population".to_string()),
        filters: HashMap::from([("city".to_string(), "dam".to_string())]),
        ..Default::default()
    };

    let page1 = query_rows(&store, &id, &alice, &options).unwrap();
    assert_eq!(page1.total, 3);
    assert_eq!(values(&page1, "city"), vec!["Zaandam", "Rotterdam"]);
    println!("✓ Page 1 filtered to *dam* and sorted numerically");

    let page2 = query_rows(
        &store,
        &id,
        &alice,
        &QueryOptions {
            page: 2,
            ..options.clone()
        },
    )
    .unwrap();
    assert_eq!(page2.total, 3);
    assert_eq!(values(&page2, "city"), vec!["Amsterdam"]);
    println!("✓ Page 2 returns the remainder with a consistent total");

    let descending = query_rows(
        &store,
        &id,
        &alice,
        &QueryOptions {
            page_size: 10,
            sort_direction: SortDirection::Desc,
            ..options
        },
    )
    .unwrap();
    assert_eq!(
        values(&descending, "city"),
        vec!["Amsterdam", "Rotterdam", "Zaandam"]
    );
    println!("✓ Descending sort reverses present keys only");
}

// Cell edits replace exactly one key and respect dataset boundaries
fn test_cell_edit() {
    println!("\n====== Testing cell edits ======");

    let dataset = build_dataset(&["a", "b"], &[&[("a", "1"), ("b", "2")]]);
    let other = build_dataset(&["a"], &[&[("a", "9")]]);
    let id = dataset.id.clone();
    let other_id = other.id.clone();
    let foreign_row = other.rows[0].id.clone();

    let mut store = Store::new();
    store.insert(dataset);
    store.insert(other);
    let alice = Caller::new("alice", None);

    let row_id = store.get(&id).unwrap().rows[0].id.clone();
    let updated = update_cell(&mut store, &id, &row_id, "a", CellValue::from("7"), &alice).unwrap();
    assert_eq!(updated.data.get("a"), Some(&CellValue::from("7")));
    assert_eq!(updated.data.get("b"), Some(&CellValue::from("2")));
    println!("✓ Edit replaced one key and left the rest untouched");

    let result = update_cell(
        &mut store,
        &id,
        &foreign_row,
        "a",
        CellValue::from("0"),
        &alice,
    );
    assert!(result.is_err());
    assert_eq!(
        store.get(&other_id).unwrap().rows[0].data.get("a"),
        Some(&CellValue::from("9"))
    );
    println!("✓ Edit against the wrong dataset failed without mutating");
}

fn main() {
    test_filter_sort_paginate();
    test_cell_edit();
    println!("\nAll query tests passed!");
}
