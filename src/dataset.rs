use crate::value::CellValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A column definition, created once from the CSV header row.
///
/// The declared type is always `"string"` at storage time; the true type is
/// inferred later from sampled values and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: String,
}

/// One CSV row: a stable zero-based position plus a mapping from column
/// name to scalar value. Data keys are always a subset of the dataset's
/// declared column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub id: String,

    #[serde(rename = "rowIndex")]
    pub row_index: usize,

    pub data: HashMap<String, CellValue>,
}

/// An uploaded CSV dataset with its columns and rows.
///
/// A dataset is exclusively owned by one user unless shared, in which case
/// the team reference grants read/edit access to all team members. Only the
/// owner may rename, delete or share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub owner: String,

    #[serde(rename = "teamId")]
    pub team_id: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from parsed CSV content. Row data keys that do not
    /// match a declared column are discarded to keep the keys-subset
    /// invariant.
    pub fn new(
        name: &str,
        owner: &str,
        columns: Vec<String>,
        row_data: Vec<HashMap<String, CellValue>>,
    ) -> Self {
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|name| Column {
                name,
                column_type: "string".to_string(),
            })
            .collect();

        let rows = row_data
            .into_iter()
            .enumerate()
            .map(|(index, mut data)| {
                data.retain(|key, _| columns.iter().any(|c| c.name == *key));
                Row {
                    id: Uuid::new_v4().to_string(),
                    row_index: index,
                    data,
                }
            })
            .collect();

        Dataset {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            team_id: None,
            created_at: Utc::now(),
            columns,
            rows,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Read/edit access: the owner, or any member of the team the dataset
    /// is shared with.
    pub fn visible_to(&self, caller: &Caller) -> bool {
        if self.owner == caller.username {
            return true;
        }
        match (&self.team_id, &caller.team_id) {
            (Some(shared), Some(own)) => shared == own,
            _ => false,
        }
    }

    pub fn owned_by(&self, caller: &Caller) -> bool {
        self.owner == caller.username
    }
}

/// Explicit caller identity passed into every core operation.
///
/// Built by the transport layer from the session and the caller's team
/// membership; the core never reads ambient session state.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub username: String,
    pub team_id: Option<String>,
}

impl Caller {
    pub fn new(username: &str, team_id: Option<String>) -> Self {
        Caller {
            username: username.to_string(),
            team_id,
        }
    }
}

/// In-memory dataset store, the storage collaborator for the query
/// pipeline. Rows keep stable insertion order; snapshots are persisted
/// through the `saving` module.
#[derive(Debug, Default)]
pub struct Store {
    datasets: HashMap<String, Dataset>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn insert(&mut self, dataset: Dataset) {
        self.datasets.insert(dataset.id.clone(), dataset);
    }

    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    /// Dataset lookup under the access predicate. Hidden datasets are
    /// indistinguishable from absent ones.
    pub fn visible(&self, id: &str, caller: &Caller) -> Option<&Dataset> {
        self.datasets.get(id).filter(|d| d.visible_to(caller))
    }

    pub fn visible_mut(&mut self, id: &str, caller: &Caller) -> Option<&mut Dataset> {
        self.datasets.get_mut(id).filter(|d| d.visible_to(caller))
    }

    pub fn remove(&mut self, id: &str) -> Option<Dataset> {
        self.datasets.remove(id)
    }

    /// All datasets the caller may read, newest first.
    pub fn list_visible(&self, caller: &Caller) -> Vec<&Dataset> {
        let mut visible: Vec<&Dataset> = self
            .datasets
            .values()
            .filter(|d| d.visible_to(caller))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visible
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset(owner: &str) -> Dataset {
        let rows = vec![
            HashMap::from([("a".to_string(), CellValue::from("1"))]),
            HashMap::from([
                ("a".to_string(), CellValue::from("2")),
                ("ghost".to_string(), CellValue::from("dropped")),
            ]),
        ];
        Dataset::new("sample", owner, vec!["a".to_string(), "b".to_string()], rows)
    }

    #[test]
    fn row_keys_are_subset_of_columns() {
        let ds = sample_dataset("alice");
        assert_eq!(ds.column_count(), 2);
        assert_eq!(ds.row_count(), 2);
        for row in &ds.rows {
            for key in row.data.keys() {
                assert!(ds.has_column(key), "undeclared key survived: {}", key);
            }
        }
        assert!(!ds.rows[1].data.contains_key("ghost"));
    }

    #[test]
    fn rows_keep_insertion_order() {
        let ds = sample_dataset("alice");
        let indexes: Vec<usize> = ds.rows.iter().map(|r| r.row_index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn visibility_owner_and_team() {
        let mut ds = sample_dataset("alice");
        let alice = Caller::new("alice", None);
        let bob = Caller::new("bob", Some("team-1".to_string()));
        let carol = Caller::new("carol", Some("team-2".to_string()));

        assert!(ds.visible_to(&alice));
        assert!(!ds.visible_to(&bob));

        ds.team_id = Some("team-1".to_string());
        assert!(ds.visible_to(&bob));
        assert!(!ds.visible_to(&carol));
        assert!(ds.owned_by(&alice));
        assert!(!ds.owned_by(&bob));
    }

    #[test]
    fn hidden_datasets_look_absent() {
        let mut store = Store::new();
        let ds = sample_dataset("alice");
        let id = ds.id.clone();
        store.insert(ds);

        let bob = Caller::new("bob", None);
        assert!(store.visible(&id, &bob).is_none());
        assert!(store.visible("missing", &bob).is_none());

        let alice = Caller::new("alice", None);
        assert!(store.visible(&id, &alice).is_some());
        assert_eq!(store.list_visible(&alice).len(), 1);
        assert!(store.list_visible(&bob).is_empty());
    }
}
