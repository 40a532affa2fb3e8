//! Snapshot persistence, cache rebuilds and concurrency.

use crate::common::{
    DIM, SlowCountingStore, VocabularyEncoder, cache_with, sample_store, vocabulary_vector,
};
use inmofinder::vector::{VectorDimension, VectorIndex, VectorIndexStore};
use inmofinder::{CacheState, RecordId, RecordStore, SearchError};
use std::fs::OpenOptions;
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tempfile::TempDir;

fn dimension() -> VectorDimension {
    VectorDimension::new(DIM).unwrap()
}

#[test]
fn test_persist_then_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = VectorIndexStore::new(dir.path(), "vocabulary");
    let ids = vec![RecordId(3), RecordId(9), RecordId(12)];
    let vectors = vec![
        vocabulary_vector("casa con piscina"),
        vocabulary_vector("apartamento centro"),
        vocabulary_vector("finca"),
    ];
    let index = VectorIndex::new(ids.clone(), vectors.clone(), dimension()).unwrap();

    store.persist(&index).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded.ids(), ids.as_slice());
    assert_eq!(loaded.vectors(), vectors.as_slice());
    assert_eq!(loaded.dimension(), dimension());
}

#[test]
fn test_mismatched_lengths_are_corrupt() {
    let err: SearchError = VectorIndex::new(
        vec![RecordId(1), RecordId(2)],
        vec![vocabulary_vector("casa")],
        dimension(),
    )
    .unwrap_err()
    .into();

    assert!(matches!(err, SearchError::CorruptIndex { .. }), "{err}");
}

#[test]
fn test_empty_corpus_keeps_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));

    let first = cache.get_or_build(false).unwrap();
    let generation = cache.store_status().generation;
    assert_eq!(first.len(), 5);

    for id in 1..=5 {
        records.remove(RecordId(id));
    }
    match cache.get_or_build(true) {
        Err(SearchError::IndexUnavailable { cause, .. }) => {
            assert!(matches!(cause.as_deref(), Some(SearchError::EmptyCorpus)));
        }
        other => panic!("Expected IndexUnavailable, got {other:?}"),
    }

    // Memory and disk both still hold the first build
    assert_eq!(cache.state(), CacheState::Ready);
    assert!(Arc::ptr_eq(&cache.snapshot().unwrap(), &first));
    assert_eq!(cache.store_status().generation, generation);
    let on_disk = VectorIndexStore::new(dir.path().join("index"), "vocabulary")
        .load()
        .unwrap();
    assert_eq!(on_disk.len(), 5);
}

#[test]
fn test_corrupt_snapshot_triggers_rebuild() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder))
        .get_or_build(false)
        .unwrap();

    let index_dir = dir.path().join("index");
    let generation = std::fs::read_to_string(index_dir.join("CURRENT")).unwrap();
    let vectors = index_dir.join(generation.trim()).join("vectors.vec");
    let len = std::fs::metadata(&vectors).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&vectors)
        .unwrap()
        .set_len(len - 7)
        .unwrap();

    let counting = Arc::new(SlowCountingStore::new(
        (*records).clone(),
        Duration::ZERO,
    ));
    let cache = cache_with(&dir, counting.clone(), Arc::new(VocabularyEncoder));
    let index = cache.get_or_build(false).unwrap();

    assert_eq!(index.len(), 5);
    assert_eq!(counting.scans(), 1);
    assert_ne!(
        cache.store_status().generation.as_deref(),
        Some(generation.trim())
    );
}

#[test]
fn test_valid_snapshot_loads_without_rebuild() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder))
        .get_or_build(false)
        .unwrap();

    let counting = Arc::new(SlowCountingStore::new(
        (*records).clone(),
        Duration::ZERO,
    ));
    let cache = cache_with(&dir, counting.clone(), Arc::new(VocabularyEncoder));
    assert_eq!(cache.get_or_build(false).unwrap().len(), 5);
    assert_eq!(counting.scans(), 0);
}

#[test]
fn test_concurrent_forced_rebuilds_run_once() {
    const THREADS: usize = 8;

    let dir = TempDir::new().unwrap();
    let counting = Arc::new(SlowCountingStore::new(
        sample_store(),
        Duration::from_millis(200),
    ));
    let cache = cache_with(&dir, counting.clone(), Arc::new(VocabularyEncoder));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                cache.get_or_build(true).map(|index| index.len())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 5);
    }
    assert_eq!(counting.scans(), 1);
    assert_eq!(cache.build_count(), 1);
}

#[test]
fn test_records_added_after_build_are_not_indexed_until_rebuild() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    assert_eq!(cache.get_or_build(false).unwrap().len(), 5);

    records
        .insert(crate::common::listing(0, "Casa nueva", 400_000_000))
        .unwrap();
    assert_eq!(records.list_all_records().unwrap().len(), 6);
    assert_eq!(cache.get_or_build(false).unwrap().len(), 5);
    assert_eq!(cache.get_or_build(true).unwrap().len(), 6);
}
