//! Index cache manager: the process-wide owner of the in-memory vector index.
//!
//! One `IndexCache` is constructed per process (or per test) and shared by
//! cloning. Lifecycle: `Uninitialized` -> `Loading` -> `Ready`. The first
//! caller pays for loading or rebuilding; everyone after that reads the
//! published `Arc<VectorIndex>` without I/O.
//!
//! Builds are serialized by the injected build lock. A caller that waited on
//! the lock while another build ran receives that build's outcome instead of
//! starting a redundant one.

use crate::error::{SearchError, SearchResult};
use crate::storage::RecordStore;
use crate::vector::{EmbeddingGenerator, IndexStatus, VectorIndex, VectorIndexStore};
use crossbeam_channel::{RecvTimeoutError, bounded};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Loading,
    Ready,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

struct Inner {
    store: VectorIndexStore,
    records: Arc<dyn RecordStore>,
    encoder: Arc<dyn EmbeddingGenerator>,
    batch_size: AtomicUsize,
    build_lock: Arc<Mutex<()>>,
    snapshot: RwLock<Option<Arc<VectorIndex>>>,
    state: Mutex<CacheState>,
    /// Completed build attempts, successful or not
    attempts: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

#[derive(Clone)]
pub struct IndexCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for IndexCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexCache")
            .field("root", &self.inner.store.root())
            .field("state", &self.state())
            .field("build_count", &self.build_count())
            .finish()
    }
}

/// Resets `Loading` if a build unwinds before finishing.
struct LoadingGuard<'a> {
    cache: &'a IndexCache,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.settle_state();
        }
    }
}

impl IndexCache {
    pub fn new(
        store: VectorIndexStore,
        records: Arc<dyn RecordStore>,
        encoder: Arc<dyn EmbeddingGenerator>,
        build_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                records,
                encoder,
                batch_size: AtomicUsize::new(64),
                build_lock,
                snapshot: RwLock::new(None),
                state: Mutex::new(CacheState::Uninitialized),
                attempts: AtomicU64::new(0),
                last_failure: Mutex::new(None),
            }),
        }
    }

    /// Sets the encode batch size used by rebuilds.
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        self.inner
            .batch_size
            .store(batch_size.max(1), Ordering::Relaxed);
        self
    }

    pub fn state(&self) -> CacheState {
        *self.inner.state.lock()
    }

    /// The published index, if any. Never blocks on a build.
    pub fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.inner.snapshot.read().clone()
    }

    pub fn build_count(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn encoder(&self) -> Arc<dyn EmbeddingGenerator> {
        Arc::clone(&self.inner.encoder)
    }

    pub fn store_status(&self) -> IndexStatus {
        self.inner.store.status()
    }

    /// Drops the published index and returns to `Uninitialized`.
    pub fn reset(&self) {
        let _build = self.inner.build_lock.lock();
        *self.inner.snapshot.write() = None;
        *self.inner.last_failure.lock() = None;
        self.set_state(CacheState::Uninitialized);
        debug!("Index cache reset");
    }

    /// Returns the cached index, loading or rebuilding it first if needed.
    ///
    /// Without `force`, a ready cache answers immediately. On a cold start
    /// the persisted snapshot is loaded; if that fails (missing, corrupt or
    /// stale) the index is rebuilt. With `force` the index is always rebuilt.
    ///
    /// # Errors
    /// `IndexUnavailable` when no index could be produced. A previously
    /// published index stays published.
    pub fn get_or_build(&self, force: bool) -> SearchResult<Arc<VectorIndex>> {
        if !force {
            if let Some(index) = self.snapshot() {
                return Ok(index);
            }
        }

        let observed = self.build_count();
        let _build = self.inner.build_lock.lock();

        if self.build_count() != observed {
            debug!(force, "Sharing result of a build that finished while waiting");
            return self.shared_outcome(force);
        }
        if !force {
            if let Some(index) = self.snapshot() {
                return Ok(index);
            }
        }

        self.set_state(CacheState::Loading);
        let mut guard = LoadingGuard {
            cache: self,
            armed: true,
        };

        let outcome = if force {
            info!("Forced rebuild of vector index");
            self.rebuild()
        } else {
            match self.inner.store.load() {
                Ok(index) => Ok(index),
                Err(load_err) => {
                    match &load_err {
                        SearchError::IndexUnavailable { .. } => {
                            info!("No persisted snapshot, building vector index")
                        }
                        other => warn!(error = %other, "Snapshot unusable, rebuilding"),
                    }
                    self.rebuild()
                }
            }
        };

        let result = match outcome {
            Ok(index) => {
                let index = Arc::new(index);
                *self.inner.snapshot.write() = Some(Arc::clone(&index));
                *self.inner.last_failure.lock() = None;
                self.set_state(CacheState::Ready);
                info!(count = index.len(), "Vector index ready");
                Ok(index)
            }
            Err(err) => {
                let reason = format!("Index build failed: {err}");
                *self.inner.last_failure.lock() = Some(reason.clone());
                self.settle_state();
                warn!(error = %err, "Vector index unavailable");
                Err(SearchError::IndexUnavailable {
                    reason,
                    cause: Some(Box::new(err)),
                })
            }
        };

        guard.armed = false;
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        result
    }

    /// Like [`get_or_build`](Self::get_or_build), but gives up waiting after
    /// `timeout`.
    ///
    /// The build runs on a detached thread, so a caller that times out does
    /// not cancel it; later callers still receive its result.
    pub fn get_or_build_within(
        &self,
        force: bool,
        timeout: Duration,
    ) -> SearchResult<Arc<VectorIndex>> {
        if !force {
            if let Some(index) = self.snapshot() {
                return Ok(index);
            }
        }

        let (tx, rx) = bounded(1);
        let cache = self.clone();
        std::thread::Builder::new()
            .name("index-build".to_string())
            .spawn(move || {
                let _ = tx.send(cache.get_or_build(force));
            })
            .map_err(|e| SearchError::IndexUnavailable {
                reason: format!("Failed to start index build: {e}"),
                cause: None,
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Index build still running");
                Err(SearchError::IndexUnavailable {
                    reason: format!(
                        "Index build still running after {}ms",
                        timeout.as_millis()
                    ),
                    cause: None,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(SearchError::IndexUnavailable {
                reason: "Index build thread exited without a result".to_string(),
                cause: None,
            }),
        }
    }

    fn rebuild(&self) -> SearchResult<VectorIndex> {
        self.inner.store.rebuild(
            self.inner.records.as_ref(),
            self.inner.encoder.as_ref(),
            self.inner.batch_size.load(Ordering::Relaxed),
        )
    }

    fn shared_outcome(&self, force: bool) -> SearchResult<Arc<VectorIndex>> {
        if !force {
            if let Some(index) = self.snapshot() {
                return Ok(index);
            }
        }
        if let Some(failure) = self.inner.last_failure.lock().clone() {
            return Err(SearchError::IndexUnavailable {
                reason: failure,
                cause: None,
            });
        }
        self.snapshot().ok_or_else(|| SearchError::IndexUnavailable {
            reason: "Concurrent build produced no index".to_string(),
            cause: None,
        })
    }

    fn settle_state(&self) {
        let state = if self.snapshot().is_some() {
            CacheState::Ready
        } else {
            CacheState::Uninitialized
        };
        self.set_state(state);
    }

    fn set_state(&self, state: CacheState) {
        let mut current = self.inner.state.lock();
        if *current != state {
            debug!(from = %*current, to = %state, "Index cache state change");
            *current = state;
        }
    }
}
