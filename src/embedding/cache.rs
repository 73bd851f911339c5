//! Load-once holder for the tokenizer and inference engine.
//!
//! [`ModelCache`] is constructed explicitly with a model path and a
//! [`ModelLoader`], then shared (usually behind an `Arc`) by everything in
//! the process that embeds text. The first [`ModelCache::ensure_loaded`] call
//! runs the loader; concurrent first callers block on the same `OnceLock`
//! until it finishes, and every later call is a lock-free read.
//!
//! A failed load is cached too. Model artifacts are static deployment
//! files, so there is nothing to gain from retrying.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use super::engine::OnnxEngine;
use super::tokenizer::HfTokenizer;
use super::{InferenceEngine, Result, TokenizerAdapter};
use crate::config::ModelConfig;

/// A loaded tokenizer + engine pair and the facts derived from them.
pub struct ModelHandle {
    pub model_path: PathBuf,
    pub tokenizer: Arc<dyn TokenizerAdapter>,
    pub engine: Arc<dyn InferenceEngine>,
    pub output_name: String,
    pub max_sequence_length: usize,
    pub embedding_dimension: usize,
}

impl ModelHandle {
    pub fn new(
        model_path: impl Into<PathBuf>,
        tokenizer: Arc<dyn TokenizerAdapter>,
        engine: Arc<dyn InferenceEngine>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            output_name: engine.output_name().to_string(),
            max_sequence_length: tokenizer.max_sequence_length(),
            embedding_dimension: engine.embedding_dimension(),
            tokenizer,
            engine,
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_path", &self.model_path)
            .field("output_name", &self.output_name)
            .field("max_sequence_length", &self.max_sequence_length)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish_non_exhaustive()
    }
}

/// Builds a [`ModelHandle`] from a model path. Called at most once per cache.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<ModelHandle>;
}

/// Loads `model.onnx` via ONNX Runtime and the tokenizer co-located with it.
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    pub tokenizer_file: String,
    pub intra_threads: usize,
    pub max_len_override: Option<usize>,
}

impl OnnxModelLoader {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            tokenizer_file: config.tokenizer_file.clone(),
            intra_threads: config.intra_threads,
            max_len_override: config.max_sequence_length,
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, model_path: &Path) -> Result<ModelHandle> {
        let tokenizer_path = model_path.with_file_name(&self.tokenizer_file);
        let tokenizer = HfTokenizer::from_file(&tokenizer_path, self.max_len_override)?;
        let engine = OnnxEngine::from_file(model_path, self.intra_threads)?;
        Ok(ModelHandle::new(
            model_path,
            Arc::new(tokenizer),
            Arc::new(engine),
        ))
    }
}

pub struct ModelCache {
    model_path: PathBuf,
    loader: Box<dyn ModelLoader>,
    handle: OnceLock<Result<Arc<ModelHandle>>>,
    loads: AtomicUsize,
}

impl ModelCache {
    pub fn new(model_path: impl Into<PathBuf>, loader: impl ModelLoader + 'static) -> Self {
        Self {
            model_path: model_path.into(),
            loader: Box::new(loader),
            handle: OnceLock::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Cache backed by [`OnnxModelLoader`] for the configured model file.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.model_path(), OnnxModelLoader::from_config(config))
    }

    /// Return the loaded model, loading it first if nobody has yet.
    ///
    /// Takes no path: the model path is fixed when the cache is built
    /// ([`ModelCache::new`] / [`ModelCache::from_config`]), so one cache
    /// always serves one model.
    pub fn ensure_loaded(&self) -> Result<Arc<ModelHandle>> {
        self.handle
            .get_or_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                tracing::info!(model = %self.model_path.display(), "loading embedding model");
                let handle = self.loader.load(&self.model_path).map(Arc::new);
                match &handle {
                    Ok(h) => tracing::info!(
                        dim = h.embedding_dimension,
                        max_len = h.max_sequence_length,
                        output = %h.output_name,
                        "embedding model ready"
                    ),
                    Err(e) => tracing::error!(error = %e, "embedding model failed to load"),
                }
                handle
            })
            .clone()
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.handle.get(), Some(Ok(_)))
    }

    /// Number of times the loader has run. Never exceeds 1.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}
