//! Encoder adapter: turns listing text into embedding vectors.
//!
//! The production implementation wraps fastembed. Model loading is expensive
//! and can fail (missing weights, no network for the first download), so the
//! search path goes through [`LazyEmbeddingGenerator`], which defers the load
//! to first use and retries after a failure. Query encoding carries a timeout
//! via [`encode_with_timeout`].

use crate::vector::{VectorDimension, VectorError};
use crossbeam_channel::{RecvTimeoutError, bounded};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Trait for generating embeddings from text.
///
/// Implementations must be deterministic for a fixed model version: the same
/// text always produces the same vector.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per input in order.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Generate the embedding for a single text.
    fn encode(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        self.encode_batch(&[text])?.pop().ok_or_else(|| {
            VectorError::EmbeddingFailed("Model returned no embedding".to_string())
        })
    }

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Name of the configured model, recorded in snapshot metadata.
    fn model_name(&self) -> &str;
}

/// Parse a model name from configuration into a fastembed model and its
/// output dimension.
pub fn parse_embedding_model(name: &str) -> Result<(EmbeddingModel, VectorDimension), VectorError> {
    let (model, dim) = match name {
        "AllMiniLML6V2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "ParaphraseMLMiniLML12V2" => (EmbeddingModel::ParaphraseMLMiniLML12V2, 384),
        "MultilingualE5Small" => (EmbeddingModel::MultilingualE5Small, 384),
        "BGESmallENV15" => (EmbeddingModel::BGESmallENV15, 384),
        "BGEBaseENV15" => (EmbeddingModel::BGEBaseENV15, 768),
        other => return Err(VectorError::UnknownModel(other.to_string())),
    };
    Ok((model, VectorDimension::new(dim)?))
}

/// FastEmbed implementation.
///
/// # Performance
/// - Batch processing: ~1-10ms per embedding on average
/// - Memory: dimension * 4 bytes per embedding
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
}

impl FastEmbedGenerator {
    /// Create a generator for the named model, downloading weights into
    /// `cache_dir` on first use.
    ///
    /// # Errors
    /// Returns an error if the name is unknown or the model fails to
    /// initialize or download.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_progress: bool,
    ) -> Result<Self, VectorError> {
        let (model, dimension) = parse_embedding_model(model_name)?;

        let model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_progress),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Defers model construction until the first encode call.
///
/// A successful load is kept for the lifetime of the generator. A failed
/// load is reported to the caller and attempted again on the next call.
pub struct LazyEmbeddingGenerator {
    model_name: String,
    dimension: VectorDimension,
    cache_dir: PathBuf,
    show_progress: bool,
    loaded: parking_lot::Mutex<Option<Arc<FastEmbedGenerator>>>,
}

impl LazyEmbeddingGenerator {
    /// Validates the model name eagerly; nothing is loaded yet.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, VectorError> {
        let (_, dimension) = parse_embedding_model(model_name)?;
        Ok(Self {
            model_name: model_name.to_string(),
            dimension,
            cache_dir,
            show_progress: false,
            loaded: parking_lot::Mutex::new(None),
        })
    }

    /// Show the fastembed download progress bar on first load.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().is_some()
    }

    fn generator(&self) -> Result<Arc<FastEmbedGenerator>, VectorError> {
        let mut slot = self.loaded.lock();
        if let Some(generator) = slot.as_ref() {
            return Ok(Arc::clone(generator));
        }

        debug!(model = %self.model_name, "Loading embedding model");
        match FastEmbedGenerator::new(&self.model_name, self.cache_dir.clone(), self.show_progress)
        {
            Ok(generator) => {
                info!(model = %self.model_name, "Embedding model loaded");
                let generator = Arc::new(generator);
                *slot = Some(Arc::clone(&generator));
                Ok(generator)
            }
            Err(e) => {
                warn!(model = %self.model_name, error = %e, "Embedding model failed to load");
                Err(e)
            }
        }
    }
}

impl EmbeddingGenerator for LazyEmbeddingGenerator {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        self.generator()?.encode_batch(texts)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Encode `text` on a worker thread, giving up after `timeout`.
///
/// The worker is detached: when the caller gives up, the encode still runs
/// to completion in the background and its result is dropped.
pub fn encode_with_timeout(
    encoder: Arc<dyn EmbeddingGenerator>,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, VectorError> {
    let (tx, rx) = bounded(1);
    let text = text.to_string();

    std::thread::Builder::new()
        .name("query-encoder".to_string())
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(encoder.encode(&text));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(VectorError::EncodeTimeout {
            timeout_ms: timeout.as_millis(),
        }),
        Err(RecvTimeoutError::Disconnected) => Err(VectorError::EmbeddingFailed(
            "Encoder thread exited without a result".to_string(),
        )),
    }
}

/// Mock embedding generator for testing.
///
/// Generates deterministic embeddings from listing vocabulary.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
}

#[cfg(test)]
impl Default for MockEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::dimension_384(),
        }
    }

    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self { dimension }
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        let dim = self.dimension.get();
        let mut embeddings = Vec::new();

        for text in texts {
            let text = text.to_lowercase();
            let mut embedding = vec![0.1; dim];

            if (text.contains("pool") || text.contains("piscina")) && dim > 1 {
                embedding[0] = 0.9;
                embedding[1] = 0.8;
            }
            if (text.contains("apartment") || text.contains("apartamento")) && dim > 3 {
                embedding[2] = 0.85;
                embedding[3] = 0.75;
            }
            if text.contains("house") && dim > 5 {
                embedding[4] = 0.8;
                embedding[5] = 0.7;
            }
            if text.contains("pets") && dim > 7 {
                embedding[6] = 0.9;
                embedding[7] = 0.85;
            }

            // Normalize to unit length like real embeddings
            let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if magnitude > 0.0 {
                for val in &mut embedding {
                    *val /= magnitude;
                }
            }

            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VECTOR_DIMENSION_384;

    struct SlowGenerator;

    impl EmbeddingGenerator for SlowGenerator {
        fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> VectorDimension {
            VectorDimension::new(2).unwrap()
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn test_mock_embedding_generator() {
        let generator = MockEmbeddingGenerator::new();

        let embedding = generator.encode("House with a pool").unwrap();
        assert_eq!(embedding.len(), VECTOR_DIMENSION_384);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_mock_is_deterministic() {
        let generator = MockEmbeddingGenerator::new();
        let texts = ["Apartamento en Laureles", "Casa campestre con piscina"];

        let first = generator.encode_batch(&texts).unwrap();
        let second = generator.encode_batch(&texts).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_parse_embedding_model() {
        let (_, dim) = parse_embedding_model("AllMiniLML6V2").unwrap();
        assert_eq!(dim.get(), 384);

        let (_, dim) = parse_embedding_model("BGEBaseENV15").unwrap();
        assert_eq!(dim.get(), 768);

        assert!(matches!(
            parse_embedding_model("word2vec"),
            Err(VectorError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_lazy_generator_does_not_load_on_construction() {
        let generator =
            LazyEmbeddingGenerator::new("AllMiniLML6V2", std::env::temp_dir()).unwrap();
        assert!(!generator.is_loaded());
        assert_eq!(generator.dimension().get(), 384);
        assert_eq!(generator.model_name(), "AllMiniLML6V2");
    }

    #[test]
    fn test_encode_with_timeout_returns_result() {
        let encoder: Arc<dyn EmbeddingGenerator> = Arc::new(MockEmbeddingGenerator::new());
        let vector = encode_with_timeout(encoder, "pool", Duration::from_secs(5)).unwrap();
        assert_eq!(vector.len(), VECTOR_DIMENSION_384);
    }

    #[test]
    fn test_encode_with_timeout_expires() {
        let encoder: Arc<dyn EmbeddingGenerator> = Arc::new(SlowGenerator);
        let result = encode_with_timeout(encoder, "pool", Duration::from_millis(20));
        assert!(matches!(result, Err(VectorError::EncodeTimeout { .. })));
    }

    #[test]
    #[ignore = "Downloads the embedding model"]
    fn test_fastembed_generator_real_model() {
        let cache = tempfile::TempDir::new().unwrap();
        let generator =
            FastEmbedGenerator::new("AllMiniLML6V2", cache.path().to_path_buf(), false).unwrap();
        let vectors = generator
            .encode_batch(&["Casa con piscina", "Apartamento amoblado"])
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 384);
    }
}
