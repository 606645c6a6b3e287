use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::dataset::{Dataset, Store};

/// Snapshot location for one dataset: `<data_dir>/<owner>/<id>.json.gz`
pub fn dataset_path(data_dir: &Path, owner: &str, id: &str) -> PathBuf {
    data_dir.join(owner).join(format!("{}.json.gz", id))
}

pub fn save_dataset(dataset: &Dataset, data_dir: &Path) -> io::Result<()> {
    let path = dataset_path(data_dir, &dataset.owner, &dataset.id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let writer = io::BufWriter::new(encoder);

    serde_json::to_writer(writer, dataset)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

pub fn load_dataset(path: &Path) -> io::Result<Dataset> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let reader = io::BufReader::new(decoder);

    serde_json::from_reader(reader)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn remove_dataset(data_dir: &Path, owner: &str, id: &str) -> io::Result<()> {
    let path = dataset_path(data_dir, owner, id);
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Load every snapshot under the data dir into a fresh store. Unreadable
/// snapshots are skipped with a warning rather than aborting startup.
pub fn load_store(data_dir: &Path) -> io::Result<Store> {
    let mut store = Store::new();
    let entries = match fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(store),
        Err(e) => return Err(e),
    };

    for entry in entries.flatten() {
        let user_dir = entry.path();
        if !user_dir.is_dir() {
            continue;
        }
        for file in fs::read_dir(&user_dir)?.flatten() {
            let path = file.path();
            if !path.to_string_lossy().ends_with(".json.gz") {
                continue;
            }
            match load_dataset(&path) {
                Ok(dataset) => store.insert(dataset),
                Err(e) => log::warn!("skipping unreadable snapshot {:?}: {}", path, e),
            }
        }
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;
    use std::collections::HashMap;

    fn sample() -> Dataset {
        Dataset::new(
            "cities",
            "alice",
            vec!["city".to_string()],
            vec![
                HashMap::from([("city".to_string(), CellValue::from("Utrecht"))]),
                HashMap::from([("city".to_string(), CellValue::Number(7.0))]),
            ],
        )
    }

    #[test]
    fn datasets_round_trip_through_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = sample();
        save_dataset(&dataset, dir.path()).unwrap();

        let path = dataset_path(dir.path(), "alice", &dataset.id);
        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded.id, dataset.id);
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(
            loaded.rows[0].data.get("city"),
            Some(&CellValue::from("Utrecht"))
        );
        assert_eq!(
            loaded.rows[1].data.get("city"),
            Some(&CellValue::Number(7.0))
        );
    }

    #[test]
    fn load_store_collects_all_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let a = sample();
        let mut b = sample();
        b.owner = "bob".to_string();
        save_dataset(&a, dir.path()).unwrap();
        save_dataset(&b, dir.path()).unwrap();

        let store = load_store(dir.path()).unwrap();
        assert!(store.get(&a.id).is_some());
        assert!(store.get(&b.id).is_some());
    }

    #[test]
    fn missing_data_dir_is_an_empty_store() {
        let store = load_store(Path::new("/nonexistent/csvhub-test")).unwrap();
        assert!(store.iter().next().is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = sample();
        save_dataset(&dataset, dir.path()).unwrap();
        remove_dataset(dir.path(), "alice", &dataset.id).unwrap();
        remove_dataset(dir.path(), "alice", &dataset.id).unwrap();
    }
}
