//! Text-to-vector embedding pipeline.
//!
//! The pipeline is built from two black-box adapters and a handful of pure
//! stages around them:
//!
//! - [`TokenizerAdapter`]: subword tokenizer ([`tokenizer::HfTokenizer`])
//! - [`InferenceEngine`]: vector-producing model ([`engine::OnnxEngine`])
//! - [`cache::ModelCache`]: lazy, load-once holder of both adapters
//! - [`chunker`]: token-window chunking for texts over the model limit
//! - [`batch`]: bounded batches padded to their longest member
//! - [`aggregate`]: chunk mean + L2 normalization
//! - [`service::EmbeddingService`]: the public entry point
//!
//! All methods are synchronous. Callers in async contexts should use
//! `tokio::task::spawn_blocking`.

pub mod aggregate;
pub mod batch;
pub mod cache;
pub mod chunker;
pub mod engine;
pub mod error;
pub mod service;
pub mod tokenizer;

use ndarray::Array2;

pub use cache::{ModelCache, ModelHandle, ModelLoader, OnnxModelLoader};
pub use error::{EmbedError, Result};
pub use service::{EmbeddingOptions, EmbeddingRequest, EmbeddingResult, EmbeddingService};

/// Max input length assumed when neither the config nor the tokenizer files state one.
pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

/// A tokenized batch, every row padded to the same length.
///
/// Shape of both matrices is `[batch, sequence]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub input_ids: Array2<i64>,
    pub attention_mask: Array2<i64>,
}

impl EncodedBatch {
    pub fn batch_size(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }
}

/// Subword tokenizer boundary.
pub trait TokenizerAdapter: Send + Sync {
    /// Encode `text` into token ids, without truncation.
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>>;

    /// Encode `texts` with special tokens, truncated and padded to exactly `pad_to` tokens.
    fn encode_batch(&self, texts: &[&str], pad_to: usize) -> Result<EncodedBatch>;

    /// Decode ids back into text.
    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String>;

    /// Longest input (special tokens included) the model accepts.
    fn max_sequence_length(&self) -> usize;
}

/// Vector-producing inference engine boundary.
///
/// Implementations return one row per batch item: `[batch, hidden]`.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, batch: &EncodedBatch) -> Result<Array2<f32>>;

    /// Name of the output tensor the vectors are read from.
    fn output_name(&self) -> &str;

    fn embedding_dimension(&self) -> usize;
}
