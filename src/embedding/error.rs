//! Error kinds surfaced by the embedding pipeline.

use thiserror::Error;

/// Errors produced while loading the model or generating embeddings.
///
/// `Clone` so a failed load can be cached and handed to every later caller
/// without re-attempting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedError {
    /// Model or tokenizer artifact missing or unreadable. Fatal for the process.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The tokenizer rejected the input text.
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    /// The inference engine call failed or returned an unusable output.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Chunking or batching parameters are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EmbedError {
    pub fn model_load(msg: impl std::fmt::Display) -> Self {
        Self::ModelLoad(msg.to_string())
    }

    pub fn tokenization(msg: impl std::fmt::Display) -> Self {
        Self::Tokenization(msg.to_string())
    }

    pub fn inference(msg: impl std::fmt::Display) -> Self {
        Self::Inference(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;
