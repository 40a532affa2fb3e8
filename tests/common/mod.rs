#![allow(dead_code)]

use inmofinder::storage::{RecordStore, StoreResult};
use inmofinder::vector::{EmbeddingGenerator, VectorDimension, VectorError, VectorIndexStore};
use inmofinder::{IndexCache, MemoryRecordStore, Record, RecordId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub const DIM: usize = 8;

/// Embeds text by vocabulary buckets, so related listings land close together.
pub struct VocabularyEncoder;

impl EmbeddingGenerator for VocabularyEncoder {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts.iter().map(|t| vocabulary_vector(t)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(DIM).unwrap()
    }

    fn model_name(&self) -> &str {
        "vocabulary"
    }
}

pub fn vocabulary_vector(text: &str) -> Vec<f32> {
    const BUCKETS: [&[&str]; DIM - 1] = [
        &["pool", "piscina"],
        &["house", "casa"],
        &["apartment", "apartamento"],
        &["garden", "jardin"],
        &["pets", "mascotas"],
        &["downtown", "centro"],
        &["farm", "finca"],
    ];
    let text = text.to_lowercase();
    let mut v = vec![0.0; DIM];
    for (i, words) in BUCKETS.iter().enumerate() {
        if words.iter().any(|w| text.contains(w)) {
            v[i] = 1.0;
        }
    }
    // Shared component keeps every vector non-zero
    v[DIM - 1] = 0.2;
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.into_iter().map(|x| x / norm).collect()
}

/// Encoder whose model never loads.
pub struct FailingEncoder;

impl EmbeddingGenerator for FailingEncoder {
    fn encode_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Err(VectorError::EmbeddingFailed(
            "model weights not found".to_string(),
        ))
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(DIM).unwrap()
    }

    fn model_name(&self) -> &str {
        "vocabulary"
    }
}

/// Record store that counts full scans and makes each one slow.
pub struct SlowCountingStore {
    pub inner: MemoryRecordStore,
    pub scans: AtomicUsize,
    pub delay: Duration,
}

impl SlowCountingStore {
    pub fn new(inner: MemoryRecordStore, delay: Duration) -> Self {
        Self {
            inner,
            scans: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl RecordStore for SlowCountingStore {
    fn list_all_records(&self) -> StoreResult<Vec<Record>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.list_all_records()
    }

    fn get_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>> {
        self.inner.get_by_ids(ids)
    }
}

pub fn listing(id: u32, title: &str, price: u64) -> Record {
    let mut record = Record::new(RecordId(id));
    record.title = Some(title.to_string());
    record.price = Some(price);
    record
}

/// A small catalog covering the vocabulary buckets.
pub fn sample_store() -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    let mut records = vec![
        listing(1, "House with a pool", 850_000_000),
        listing(2, "Apartment downtown", 320_000_000),
        listing(3, "Casa con jardin", 540_000_000),
        listing(4, "Finca con piscina", 1_200_000_000),
        listing(5, "Apartamento centro, acepta mascotas", 280_000_000),
    ];
    records[1].location = Some("Medellín, El Poblado".to_string());
    records[3].property_type = Some("Finca".to_string());
    records[4].pets_allowed = Some(true);
    for record in records {
        store.put(record).unwrap();
    }
    store
}

pub fn cache_with(
    dir: &TempDir,
    records: Arc<dyn RecordStore>,
    encoder: Arc<dyn EmbeddingGenerator>,
) -> IndexCache {
    IndexCache::new(
        VectorIndexStore::new(dir.path().join("index"), encoder.model_name().to_string()),
        records,
        encoder,
        Arc::new(Mutex::new(())),
    )
}
