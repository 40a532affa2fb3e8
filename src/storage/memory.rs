use crate::storage::{RecordStore, StoreError, StoreResult};
use crate::types::{Record, RecordId};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// In-process record store, optionally persisted as a JSON array.
#[derive(Clone, Debug)]
pub struct MemoryRecordStore {
    records: Arc<DashMap<RecordId, Record>>,
    next_id: Arc<AtomicU32>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Builds a store from records that already carry ids.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> StoreResult<Self> {
        let store = Self::new();
        for record in records {
            store.put(record)?;
        }
        Ok(store)
    }

    /// Loads a store from a JSON array of records. A missing file is an
    /// empty store.
    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Record file missing, starting empty");
            return Ok(Self::new());
        }

        let json = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<Record> =
            serde_json::from_str(&json).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let store = Self::from_records(records)?;
        debug!(path = %path.display(), count = store.len(), "Loaded records");
        Ok(store)
    }

    /// Writes all records, ordered by id, as a JSON array.
    pub fn save_json(&self, path: &Path) -> StoreResult<()> {
        let records = self.to_vec();
        let json = serde_json::to_string_pretty(&records)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Inserts a new record under the next free id. Any id on `record` is
    /// replaced; a missing `created_at` is set to now.
    pub fn insert(&self, mut record: Record) -> StoreResult<RecordId> {
        let raw = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|_| StoreError::IdExhausted)?;
        let id = RecordId::new(raw).ok_or(StoreError::IdExhausted)?;

        record.id = id;
        if record.created_at.is_none() {
            record.created_at = Some(chrono::Utc::now());
        }
        self.records.insert(id, record);
        Ok(id)
    }

    /// Stores a record under its own id. Fails if the id is zero or taken.
    pub fn put(&self, record: Record) -> StoreResult<()> {
        let id = record.id;
        if id.value() == 0 {
            return Err(StoreError::ZeroId);
        }
        if self.records.contains_key(&id) {
            return Err(StoreError::DuplicateId(id.value()));
        }
        self.records.insert(id, record);
        self.next_id
            .fetch_max(id.value().saturating_add(1), Ordering::SeqCst);
        Ok(())
    }

    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.records.get(&id).map(|entry| entry.clone())
    }

    pub fn remove(&self, id: RecordId) -> Option<Record> {
        self.records.remove(&id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record, ordered by id.
    pub fn to_vec(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn list_all_records(&self) -> StoreResult<Vec<Record>> {
        Ok(self.to_vec())
    }

    fn get_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>> {
        Ok(ids.iter().filter_map(|id| self.get(*id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RecordQuery;
    use tempfile::TempDir;

    fn titled(title: &str) -> Record {
        let mut record = Record::new(RecordId(1));
        record.title = Some(title.to_string());
        record
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let store = MemoryRecordStore::new();

        let a = store.insert(titled("a")).unwrap();
        let b = store.insert(titled("b")).unwrap();

        assert_eq!(a.value(), 1);
        assert_eq!(b.value(), 2);
        assert!(store.get(a).unwrap().created_at.is_some());
    }

    #[test]
    fn test_put_rejects_duplicates_and_advances_ids() {
        let store = MemoryRecordStore::new();
        let mut record = titled("x");
        record.id = RecordId(10);

        store.put(record.clone()).unwrap();
        assert!(matches!(store.put(record), Err(StoreError::DuplicateId(10))));

        let next = store.insert(titled("y")).unwrap();
        assert_eq!(next.value(), 11);
    }

    #[test]
    fn test_json_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");

        let store = MemoryRecordStore::new();
        store.insert(titled("Casa")).unwrap();
        store.insert(titled("Apartamento")).unwrap();
        store.save_json(&path).unwrap();

        let loaded = MemoryRecordStore::from_json_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.get(RecordId(2)).unwrap().title.as_deref(),
            Some("Apartamento")
        );
    }

    #[test]
    fn test_put_rejects_zero_id() {
        let store = MemoryRecordStore::new();
        let mut record = titled("Casa con piscina");
        record.id = RecordId(0);

        assert!(matches!(store.put(record), Err(StoreError::ZeroId)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_with_zero_id_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        std::fs::write(&path, r#"[{"id":0,"title":"Casa con piscina"}]"#).unwrap();

        assert!(matches!(
            MemoryRecordStore::from_json_file(&path),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = MemoryRecordStore::from_json_file(&temp_dir.path().join("nope.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_default_query_uses_all_records() {
        let store = MemoryRecordStore::new();
        store.insert(titled("a")).unwrap();
        store.insert(titled("b")).unwrap();

        let records = store.query(&RecordQuery::all()).unwrap();
        assert_eq!(records.len(), 2);
    }
}
