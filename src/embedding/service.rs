//! Public entry point: tags and free text in, `(text, vector)` pairs out.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::aggregate::{aggregate_document, l2_normalize};
use super::batch::{run_batches, PadPolicy, CHUNK_BATCH_SIZE, TAG_BATCH_SIZE};
use super::cache::{ModelCache, ModelHandle};
use super::chunker::{chunk, ChunkPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_STRIDE};
use super::Result;
use crate::config::{PipelineConfig, SparkConfig};

/// Separator between tags in the raw tag string.
pub const TAG_SEPARATOR: char = ';';

/// Token cap for a single tag.
pub const TAG_MAX_LENGTH: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// `;`-delimited tag string, e.g. `"trains; toys"`.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    /// The normalized tag, or the original text verbatim.
    pub text: String,
    pub embedding: Vec<f32>,
    pub dimension: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingOptions {
    pub chunk_size: usize,
    pub stride: usize,
    pub chunk_batch_size: usize,
    pub tag_batch_size: usize,
    pub tag_max_length: usize,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stride: DEFAULT_STRIDE,
            chunk_batch_size: CHUNK_BATCH_SIZE,
            tag_batch_size: TAG_BATCH_SIZE,
            tag_max_length: TAG_MAX_LENGTH,
        }
    }
}

impl From<&PipelineConfig> for EmbeddingOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            stride: config.stride,
            chunk_batch_size: config.chunk_batch_size,
            tag_batch_size: config.tag_batch_size,
            tag_max_length: config.tag_max_length,
        }
    }
}

/// Drives chunking, batching and aggregation against a shared [`ModelCache`].
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct EmbeddingService {
    cache: Arc<ModelCache>,
    options: EmbeddingOptions,
}

impl EmbeddingService {
    pub fn new(cache: Arc<ModelCache>, options: EmbeddingOptions) -> Self {
        Self { cache, options }
    }

    /// Service over an ONNX-backed cache for the configured model.
    pub fn from_config(config: &SparkConfig) -> Self {
        Self::new(
            Arc::new(ModelCache::from_config(&config.model)),
            EmbeddingOptions::from(&config.pipeline),
        )
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn options(&self) -> EmbeddingOptions {
        self.options
    }

    /// Embed every distinct tag in `tags`, then every text in `texts`.
    ///
    /// Output holds the tag results first (first-occurrence order), then one
    /// result per text in input order, duplicates included. Loads the model on
    /// first use. Any failure aborts the whole call.
    pub fn generate_embeddings(&self, tags: &str, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        let handle = self.cache.ensure_loaded()?;

        let parsed_tags = parse_tags(tags);
        let mut results = Vec::with_capacity(parsed_tags.len() + texts.len());

        results.extend(self.embed_tags(&handle, parsed_tags)?);
        for (index, text) in texts.iter().enumerate() {
            results.push(self.embed_text(&handle, index, text)?);
        }

        tracing::debug!(
            tags = results.len() - texts.len(),
            texts = texts.len(),
            "embeddings generated"
        );
        Ok(results)
    }

    pub fn embed_request(&self, request: &EmbeddingRequest) -> Result<Vec<EmbeddingResult>> {
        self.generate_embeddings(&request.tags, &request.texts)
    }

    /// Window policy for `handle`'s model.
    ///
    /// A window plus the tokenizer's special tokens must fit in
    /// `max_sequence_length`, otherwise the batch pass would cut its tail.
    pub fn chunk_policy(&self, handle: &ModelHandle) -> Result<ChunkPolicy> {
        let special_tokens = handle.tokenizer.encode("", true)?.len();
        let content_len = handle.max_sequence_length.saturating_sub(special_tokens);
        Ok(ChunkPolicy::clamped(
            self.options.chunk_size,
            self.options.stride,
            content_len,
        ))
    }

    fn embed_tags(&self, handle: &ModelHandle, tags: Vec<String>) -> Result<Vec<EmbeddingResult>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        let pad_policy = PadPolicy {
            max_length: self.options.tag_max_length.min(handle.max_sequence_length),
        };
        let raw = run_batches(
            handle.tokenizer.as_ref(),
            handle.engine.as_ref(),
            &refs,
            self.options.tag_batch_size,
            pad_policy,
        )?;

        Ok(tags
            .into_iter()
            .zip(raw.outer_iter())
            .map(|(tag, row)| EmbeddingResult {
                text: tag,
                embedding: l2_normalize(row).to_vec(),
                dimension: handle.embedding_dimension,
            })
            .collect())
    }

    fn embed_text(&self, handle: &ModelHandle, index: usize, text: &str) -> Result<EmbeddingResult> {
        let dimension = handle.embedding_dimension;

        if text.is_empty() {
            return Ok(EmbeddingResult {
                text: String::new(),
                embedding: vec![0.0; dimension],
                dimension,
            });
        }

        let tokenizer = handle.tokenizer.as_ref();
        let max_len = handle.max_sequence_length;
        let pad_policy = PadPolicy { max_length: max_len };

        let token_len = tokenizer.encode(text, true)?.len();
        let raw = if token_len <= max_len {
            run_batches(tokenizer, handle.engine.as_ref(), &[text], 1, pad_policy)?
        } else {
            let policy = self.chunk_policy(handle)?;
            let chunks = chunk(tokenizer, index, text, policy)?;
            let refs: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            run_batches(
                tokenizer,
                handle.engine.as_ref(),
                &refs,
                self.options.chunk_batch_size,
                pad_policy,
            )?
        };

        Ok(EmbeddingResult {
            text: text.to_string(),
            embedding: aggregate_document(&raw, dimension),
            dimension,
        })
    }
}

/// Split on `;`, trim, lower-case, drop blanks and duplicates.
///
/// Keeps the first occurrence of each tag.
pub fn parse_tags(tags: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.split(TAG_SEPARATOR)
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalized_and_deduplicated() {
        assert_eq!(parse_tags("Train; train ; TOYS;Train"), vec!["train", "toys"]);
    }

    #[test]
    fn blank_tags_are_dropped() {
        assert!(parse_tags("").is_empty());
        assert_eq!(parse_tags(" ; ;Boats;;"), vec!["boats"]);
    }

    #[test]
    fn multi_word_tags_keep_inner_spaces() {
        assert_eq!(parse_tags("Multi Word Tag; other"), vec!["multi word tag", "other"]);
    }

    #[test]
    fn options_follow_pipeline_config() {
        let config = PipelineConfig {
            chunk_size: 128,
            stride: 16,
            ..PipelineConfig::default()
        };
        let options = EmbeddingOptions::from(&config);
        assert_eq!(options.chunk_size, 128);
        assert_eq!(options.stride, 16);
        assert_eq!(options.chunk_batch_size, CHUNK_BATCH_SIZE);
        assert_eq!(options.tag_batch_size, TAG_BATCH_SIZE);
    }

    #[test]
    fn request_deserializes_with_missing_fields() {
        let req: EmbeddingRequest = serde_json::from_str(r#"{"texts": ["canoe"]}"#).unwrap();
        assert_eq!(req.tags, "");
        assert_eq!(req.texts, vec!["canoe"]);
    }
}
