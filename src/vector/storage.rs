//! Persisted vector index snapshots.
//!
//! # Storage Format
//!
//! ```text
//! index_path/
//!   CURRENT              name of the live generation
//!   gen-000007/
//!     vectors.vec        header + row-major f32 LE rows
//!     ids.bin            header + u32 LE record ids
//!     metadata.json      model, dimension, count, timestamps
//! ```
//!
//! `vectors.vec` header (16 bytes): magic `IFVC`, version, dimension, row
//! count. `ids.bin` header (12 bytes): magic `IFID`, version, count. All
//! integers are u32 little-endian.
//!
//! A new generation is written to a temporary directory, synced, renamed into
//! place, and only then published by atomically replacing `CURRENT`. Readers
//! resolve `CURRENT` once, so they see either the old pair or the new pair.

use crate::corpus;
use crate::error::{SearchError, SearchResult};
use crate::semantic::SemanticMetadata;
use crate::storage::RecordStore;
use crate::types::RecordId;
use crate::vector::{EmbeddingGenerator, VectorDimension, VectorIndex};
use memmap2::MmapOptions;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

const VECTOR_MAGIC: &[u8; 4] = b"IFVC";
const ID_MAGIC: &[u8; 4] = b"IFID";

const VECTOR_HEADER_SIZE: usize = 16;
const ID_HEADER_SIZE: usize = 12;

const BYTES_PER_F32: usize = 4;
const BYTES_PER_ID: usize = 4;

const CURRENT_FILE: &str = "CURRENT";
const VECTORS_FILE: &str = "vectors.vec";
const IDS_FILE: &str = "ids.bin";
const GENERATION_PREFIX: &str = "gen-";

/// Presence and metadata of the persisted snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatus {
    pub path: PathBuf,
    pub present: bool,
    pub generation: Option<String>,
    pub metadata: Option<SemanticMetadata>,
}

/// The on-disk home of the vector index.
#[derive(Debug, Clone)]
pub struct VectorIndexStore {
    root: PathBuf,
    model_name: String,
}

impl VectorIndexStore {
    /// `model_name` is recorded on persist and required on load.
    pub fn new(root: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            model_name: model_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// True if `CURRENT` names an existing generation directory.
    pub fn is_present(&self) -> bool {
        matches!(self.current_generation(), Ok(Some(dir)) if dir.is_dir())
    }

    pub fn status(&self) -> IndexStatus {
        let generation = self.read_current().ok().flatten();
        let dir = generation.as_ref().map(|g| self.root.join(g));
        let present = dir.as_ref().is_some_and(|d| d.is_dir());
        let metadata = dir
            .filter(|_| present)
            .and_then(|d| SemanticMetadata::load(&d).ok());

        IndexStatus {
            path: self.root.clone(),
            present,
            generation,
            metadata,
        }
    }

    /// Reads the live snapshot.
    ///
    /// # Errors
    /// `IndexUnavailable` when nothing has been persisted; `CorruptIndex` for
    /// any structural problem, including a snapshot built by another model.
    pub fn load(&self) -> SearchResult<VectorIndex> {
        let dir = self
            .current_generation()?
            .ok_or_else(|| SearchError::IndexUnavailable {
                reason: format!("No snapshot in '{}'", self.root.display()),
                cause: None,
            })?;
        if !dir.is_dir() {
            return Err(corrupt(format!(
                "CURRENT points at missing generation '{}'",
                dir.display()
            )));
        }

        let metadata = SemanticMetadata::load(&dir)?;
        if metadata.model_name != self.model_name {
            return Err(corrupt(format!(
                "Snapshot was built with model '{}' but '{}' is configured",
                metadata.model_name, self.model_name
            )));
        }

        let (dimension, vectors) = read_vectors(&dir.join(VECTORS_FILE), metadata.dimension)?;
        let ids = read_ids(&dir.join(IDS_FILE))?;

        if ids.len() != vectors.len() {
            return Err(corrupt(format!(
                "Snapshot has {} ids but {} vectors",
                ids.len(),
                vectors.len()
            )));
        }
        if metadata.dimension != dimension.get() || metadata.embedding_count != ids.len() {
            return Err(corrupt(format!(
                "Metadata ({} x {}) disagrees with data ({} x {})",
                metadata.embedding_count,
                metadata.dimension,
                ids.len(),
                dimension.get()
            )));
        }

        let index = VectorIndex::new(ids, vectors, dimension)?;
        debug!(
            path = %dir.display(),
            count = index.len(),
            dimension = dimension.get(),
            "Loaded vector index snapshot"
        );
        Ok(index)
    }

    /// Atomically replaces the live snapshot with `index`.
    ///
    /// Keeps the previous generation on disk and prunes older ones.
    pub fn persist(&self, index: &VectorIndex) -> SearchResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| persistence(&self.root, e))?;

        let previous = self.read_current().ok().flatten();
        let generation = format!("{GENERATION_PREFIX}{:06}", self.next_generation_number());
        let final_dir = self.root.join(&generation);

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|e| persistence(&self.root, e))?;

        write_vectors(&staging.path().join(VECTORS_FILE), index)?;
        write_ids(&staging.path().join(IDS_FILE), index.ids())?;

        let mut metadata = SemanticMetadata::new(
            self.model_name.clone(),
            index.dimension().get(),
            index.len(),
        );
        if let Some(prev) = previous
            .as_ref()
            .and_then(|g| SemanticMetadata::load(&self.root.join(g)).ok())
        {
            metadata = metadata.succeeding(&prev);
        }
        metadata.save(staging.path())?;

        std::fs::rename(staging.path(), &final_dir).map_err(|e| persistence(&final_dir, e))?;
        // The staging path no longer exists; dropping the guard is a no-op
        drop(staging);

        self.publish(&generation)?;
        info!(
            generation = %generation,
            count = index.len(),
            model = %self.model_name,
            "Published vector index snapshot"
        );

        self.prune(&generation, previous.as_deref());
        Ok(())
    }

    /// Reads every record, embeds its corpus text in batches and persists
    /// the result.
    ///
    /// # Errors
    /// `EmptyCorpus` if the store has no records; nothing is written then.
    pub fn rebuild(
        &self,
        records: &dyn RecordStore,
        encoder: &dyn EmbeddingGenerator,
        batch_size: usize,
    ) -> SearchResult<VectorIndex> {
        let started = Instant::now();
        let records = records.list_all_records()?;
        if records.is_empty() {
            warn!(path = %self.root.display(), "Rebuild found no records");
            return Err(SearchError::EmptyCorpus);
        }

        info!(count = records.len(), model = %encoder.model_name(), "Rebuilding vector index");

        let texts: Vec<String> = records.iter().map(corpus::build).collect();
        let ids: Vec<RecordId> = records.iter().map(|r| r.id).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size.max(1)) {
            let batch: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let embeddings = encoder
                .encode_batch(&batch)
                .map_err(|e| SearchError::EncodingUnavailable {
                    reason: e.to_string(),
                })?;
            if embeddings.len() != batch.len() {
                return Err(SearchError::EncodingUnavailable {
                    reason: format!(
                        "Encoder returned {} vectors for {} texts",
                        embeddings.len(),
                        batch.len()
                    ),
                });
            }
            vectors.extend(embeddings);
            debug!(done = vectors.len(), total = texts.len(), "Encoded batch");
        }

        let index = VectorIndex::new(ids, vectors, encoder.dimension()).map_err(|e| {
            SearchError::EncodingUnavailable {
                reason: e.to_string(),
            }
        })?;
        self.persist(&index)?;

        info!(
            count = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Vector index rebuilt"
        );
        Ok(index)
    }

    fn read_current(&self) -> SearchResult<Option<String>> {
        let path = self.root.join(CURRENT_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let name = content.trim();
                let valid = name.starts_with(GENERATION_PREFIX)
                    && !name.contains(['/', '\\'])
                    && name != "."
                    && name != "..";
                if valid {
                    Ok(Some(name.to_string()))
                } else {
                    Err(corrupt(format!("CURRENT holds invalid generation '{name}'")))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(corrupt(format!("Failed to read '{}': {e}", path.display()))),
        }
    }

    fn current_generation(&self) -> SearchResult<Option<PathBuf>> {
        Ok(self.read_current()?.map(|g| self.root.join(g)))
    }

    fn generation_numbers(&self) -> Vec<(u64, String)> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let number = name.strip_prefix(GENERATION_PREFIX)?.parse::<u64>().ok()?;
                Some((number, name))
            })
            .collect()
    }

    fn next_generation_number(&self) -> u64 {
        self.generation_numbers()
            .into_iter()
            .map(|(n, _)| n)
            .max()
            .map_or(1, |n| n + 1)
    }

    fn publish(&self, generation: &str) -> SearchResult<()> {
        let target = self.root.join(CURRENT_FILE);
        let mut pointer = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| persistence(&self.root, e))?;
        pointer
            .write_all(generation.as_bytes())
            .and_then(|_| pointer.as_file().sync_all())
            .map_err(|e| persistence(pointer.path(), e))?;
        pointer
            .persist(&target)
            .map_err(|e| persistence(&target, e.error))?;
        Ok(())
    }

    fn prune(&self, current: &str, previous: Option<&str>) {
        for (_, name) in self.generation_numbers() {
            if name == current || Some(name.as_str()) == previous {
                continue;
            }
            let dir = self.root.join(&name);
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => debug!(generation = %name, "Pruned old snapshot"),
                Err(e) => warn!(generation = %name, error = %e, "Failed to prune old snapshot"),
            }
        }
    }
}

fn corrupt(reason: String) -> SearchError {
    SearchError::CorruptIndex { reason }
}

fn persistence(path: &Path, source: io::Error) -> SearchError {
    SearchError::Persistence {
        reason: format!("'{}'", path.display()),
        source,
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn write_synced(path: &Path, bytes: &[u8]) -> SearchResult<()> {
    let mut file = File::create(path).map_err(|e| persistence(path, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| persistence(path, e))
}

fn write_vectors(path: &Path, index: &VectorIndex) -> SearchResult<()> {
    let dimension = index.dimension().get();
    let mut buffer =
        Vec::with_capacity(VECTOR_HEADER_SIZE + index.len() * dimension * BYTES_PER_F32);

    buffer.extend_from_slice(VECTOR_MAGIC);
    buffer.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
    buffer.extend_from_slice(&(dimension as u32).to_le_bytes());
    buffer.extend_from_slice(&(index.len() as u32).to_le_bytes());
    for vector in index.vectors() {
        for &value in vector {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
    }

    write_synced(path, &buffer)
}

fn write_ids(path: &Path, ids: &[RecordId]) -> SearchResult<()> {
    let mut buffer = Vec::with_capacity(ID_HEADER_SIZE + ids.len() * BYTES_PER_ID);

    buffer.extend_from_slice(ID_MAGIC);
    buffer.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
    buffer.extend_from_slice(&(ids.len() as u32).to_le_bytes());
    for id in ids {
        buffer.extend_from_slice(&id.to_bytes());
    }

    write_synced(path, &buffer)
}

fn check_version(actual: u32, path: &Path) -> SearchResult<()> {
    if actual != STORAGE_VERSION {
        return Err(corrupt(format!(
            "'{}' has format version {actual}, expected {STORAGE_VERSION}",
            path.display()
        )));
    }
    Ok(())
}

/// Header sizes are validated against `expected_dimension` and the file
/// length before any row is decoded.
fn read_vectors(
    path: &Path,
    expected_dimension: usize,
) -> SearchResult<(VectorDimension, Vec<Vec<f32>>)> {
    let file = File::open(path)
        .map_err(|e| corrupt(format!("Failed to open '{}': {e}", path.display())))?;
    let len = file
        .metadata()
        .map_err(|e| corrupt(format!("Failed to stat '{}': {e}", path.display())))?
        .len() as usize;
    if len < VECTOR_HEADER_SIZE {
        return Err(corrupt(format!(
            "'{}' is too small to contain a header",
            path.display()
        )));
    }

    let mmap = unsafe { MmapOptions::new().map(&file) }
        .map_err(|e| corrupt(format!("Failed to map '{}': {e}", path.display())))?;

    if &mmap[0..4] != VECTOR_MAGIC {
        return Err(corrupt(format!("'{}' has invalid magic bytes", path.display())));
    }
    check_version(read_u32(&mmap, 4), path)?;

    let header_dimension = read_u32(&mmap, 8) as usize;
    if header_dimension != expected_dimension {
        return Err(corrupt(format!(
            "'{}' has dimension {header_dimension}, metadata says {expected_dimension}",
            path.display()
        )));
    }
    let dimension = VectorDimension::new(header_dimension)?;
    let count = read_u32(&mmap, 12) as usize;

    let sizes = dimension.get().checked_mul(BYTES_PER_F32).and_then(|row_bytes| {
        let total = count
            .checked_mul(row_bytes)?
            .checked_add(VECTOR_HEADER_SIZE)?;
        Some((row_bytes, total))
    });
    let Some((row_bytes, expected)) = sizes else {
        return Err(corrupt(format!(
            "'{}' header declares {count} rows of dimension {}",
            path.display(),
            dimension.get()
        )));
    };
    if mmap.len() != expected {
        return Err(corrupt(format!(
            "'{}' is {} bytes, header implies {expected}",
            path.display(),
            mmap.len()
        )));
    }

    let mut vectors = Vec::with_capacity(count);
    for (row_index, row) in mmap[VECTOR_HEADER_SIZE..].chunks_exact(row_bytes).enumerate() {
        let vector: Vec<f32> = row
            .chunks_exact(BYTES_PER_F32)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(corrupt(format!(
                "'{}' row {row_index} contains a non-finite value",
                path.display()
            )));
        }
        vectors.push(vector);
    }

    Ok((dimension, vectors))
}

fn read_ids(path: &Path) -> SearchResult<Vec<RecordId>> {
    let bytes = std::fs::read(path)
        .map_err(|e| corrupt(format!("Failed to read '{}': {e}", path.display())))?;
    if bytes.len() < ID_HEADER_SIZE {
        return Err(corrupt(format!(
            "'{}' is too small to contain a header",
            path.display()
        )));
    }
    if &bytes[0..4] != ID_MAGIC {
        return Err(corrupt(format!("'{}' has invalid magic bytes", path.display())));
    }
    check_version(read_u32(&bytes, 4), path)?;

    let count = read_u32(&bytes, 8) as usize;
    let expected = count
        .checked_mul(BYTES_PER_ID)
        .and_then(|n| n.checked_add(ID_HEADER_SIZE));
    if expected != Some(bytes.len()) {
        return Err(corrupt(format!(
            "'{}' is {} bytes, header implies {} ids",
            path.display(),
            bytes.len(),
            count
        )));
    }

    bytes[ID_HEADER_SIZE..]
        .chunks_exact(BYTES_PER_ID)
        .map(|b| {
            RecordId::from_bytes([b[0], b[1], b[2], b[3]])
                .ok_or_else(|| corrupt(format!("'{}' contains record id 0", path.display())))
        })
        .collect()
}
