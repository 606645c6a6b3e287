use crate::dataset::{Caller, Row, Store};
use crate::error::ApiError;
use crate::value::CellValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Sort direction for the row listing. Ascending when unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Lenient parse used by the transport layer; anything that is not
    /// "desc" means ascending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// Options for one row query.
///
/// `filters` maps column name to a substring pattern; a row matches iff
/// every pattern with a non-empty value is contained in the stringified
/// cell at that column. Matching is case-insensitive unless `match_case`
/// is set. Sorting compares numerically when both keys parse as finite
/// numbers and `numeric_sort` is on, stringwise otherwise.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub page: usize,
    pub page_size: usize,
    pub sort_column: Option<String>,
    pub sort_direction: SortDirection,
    pub filters: HashMap<String, String>,
    pub match_case: bool,
    pub numeric_sort: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            page: 1,
            page_size: 10,
            sort_column: None,
            sort_direction: SortDirection::Asc,
            filters: HashMap::new(),
            match_case: false,
            numeric_sort: true,
        }
    }
}

/// One page of matching rows plus the total match count before pagination.
#[derive(Debug, Clone, Serialize)]
pub struct RowPage {
    pub rows: Vec<Row>,
    pub total: usize,
}

/// Fetch one page of rows from a dataset visible to the caller.
///
/// Rows are filtered, stable-sorted and sliced in memory, in stored order.
/// A page past the end yields an empty slice with the total still correct.
pub fn query_rows(
    store: &Store,
    dataset_id: &str,
    caller: &Caller,
    options: &QueryOptions,
) -> Result<RowPage, ApiError> {
    if options.page == 0 {
        return Err(ApiError::invalid("page must be >= 1"));
    }
    if options.page_size == 0 {
        return Err(ApiError::invalid("page size must be >= 1"));
    }

    let dataset = store
        .visible(dataset_id, caller)
        .ok_or(ApiError::NotFound)?;

    let mut rows: Vec<Row> = dataset
        .rows
        .iter()
        .filter(|row| row_matches(row, &options.filters, options.match_case))
        .cloned()
        .collect();

    if let Some(column) = &options.sort_column {
        sort_rows(
            &mut rows,
            column,
            options.sort_direction,
            options.numeric_sort,
        );
    }

    let total = rows.len();
    let rows = paginate(rows, options.page, options.page_size);

    Ok(RowPage { rows, total })
}

/// True iff the row satisfies every active filter. Filters with an empty
/// pattern are inactive; a null or missing cell never matches.
pub fn row_matches(row: &Row, filters: &HashMap<String, String>, match_case: bool) -> bool {
    filters
        .iter()
        .filter(|(_, pattern)| !pattern.is_empty())
        .all(|(column, pattern)| match row.data.get(column) {
            Some(value) if !value.is_null() => {
                let text = value.to_string();
                if match_case {
                    text.contains(pattern)
                } else {
                    text.to_lowercase().contains(&pattern.to_lowercase())
                }
            }
            _ => false,
        })
}

/// Stable sort by one column. Rows whose sort key is null or missing order
/// last regardless of direction; only present-key pairs are reversed for
/// descending order.
pub fn sort_rows(rows: &mut [Row], column: &str, direction: SortDirection, numeric_sort: bool) {
    rows.sort_by(|left, right| {
        let a = left.data.get(column).filter(|v| !v.is_null());
        let b = right.data.get(column).filter(|v| !v.is_null());
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                let ordering = compare_values(a, b, numeric_sort);
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
        }
    });
}

fn compare_values(a: &CellValue, b: &CellValue, numeric_sort: bool) -> Ordering {
    if numeric_sort {
        if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
            return x.total_cmp(&y);
        }
    }
    a.to_string().cmp(&b.to_string())
}

fn paginate(rows: Vec<Row>, page: usize, page_size: usize) -> Vec<Row> {
    rows.into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect()
}

/// Replace exactly one key in a row's data mapping.
///
/// Fails with `NotFound` when the row does not belong to the dataset or the
/// dataset is not visible to the caller, and with `InvalidInput` for an
/// undeclared column (data keys stay a subset of the column names). No
/// conflict detection: concurrent edits are last-write-wins.
pub fn update_cell(
    store: &mut Store,
    dataset_id: &str,
    row_id: &str,
    column: &str,
    value: CellValue,
    caller: &Caller,
) -> Result<Row, ApiError> {
    let dataset = store
        .visible_mut(dataset_id, caller)
        .ok_or(ApiError::NotFound)?;

    let has_column = dataset.has_column(column);

    let row = dataset
        .rows
        .iter_mut()
        .find(|r| r.id == row_id)
        .ok_or(ApiError::NotFound)?;

    if !has_column {
        return Err(ApiError::invalid(format!("unknown column: {}", column)));
    }

    row.data.insert(column.to_string(), value);
    Ok(row.clone())
}
