//! HuggingFace `tokenizers` adapter.
//!
//! Truncation and padding baked into `tokenizer.json` are switched off at
//! load so that [`TokenizerAdapter::encode`] always sees the full text. The
//! batch path truncates the content itself and re-applies the post-processor
//! so special tokens survive the cut, then pads by hand to the requested width.

use std::path::Path;

use ndarray::Array2;
use tokenizers::{PostProcessor, Tokenizer, TruncationDirection};

use super::{EmbedError, EncodedBatch, Result, TokenizerAdapter, DEFAULT_MAX_SEQ_LEN};

/// Sidecar file read for `model_max_length`, next to `tokenizer.json`.
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// `model_max_length` values above this are HF's "unbounded" sentinel, not a real limit.
const SANE_MODEL_MAX_LEN: u64 = 100_000;

pub struct HfTokenizer {
    tokenizer: Tokenizer,
    pad_id: u32,
    special_tokens: usize,
    max_len: usize,
}

impl HfTokenizer {
    /// Load `tokenizer.json`. `max_len_override` takes precedence over whatever
    /// the tokenizer files declare.
    pub fn from_file(path: &Path, max_len_override: Option<usize>) -> Result<Self> {
        if !path.exists() {
            return Err(EmbedError::ModelLoad(format!(
                "tokenizer not found at {}",
                path.display()
            )));
        }

        let mut tokenizer = Tokenizer::from_file(path)
            .map_err(|e| EmbedError::model_load(format!("failed to parse tokenizer: {e}")))?;

        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .unwrap_or(0);

        let declared_truncation = tokenizer.get_truncation().map(|t| t.max_length);
        let max_len = max_len_override
            .or_else(|| model_max_length_from_config(path))
            .or(declared_truncation)
            .unwrap_or(DEFAULT_MAX_SEQ_LEN);

        tokenizer
            .with_truncation(None)
            .map_err(|e| EmbedError::model_load(format!("failed to clear truncation: {e}")))?;
        tokenizer.with_padding(None);

        let special_tokens = tokenizer
            .get_post_processor()
            .map(|p| p.added_tokens(false))
            .unwrap_or(0);

        if max_len <= special_tokens {
            return Err(EmbedError::ModelLoad(format!(
                "max sequence length {max_len} leaves no room for content"
            )));
        }

        tracing::info!(
            tokenizer = %path.display(),
            max_len,
            pad_id,
            "tokenizer loaded"
        );

        Ok(Self {
            tokenizer,
            pad_id,
            special_tokens,
            max_len,
        })
    }
}

impl TokenizerAdapter for HfTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, add_special_tokens)
            .map_err(EmbedError::tokenization)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn encode_batch(&self, texts: &[&str], pad_to: usize) -> Result<EncodedBatch> {
        let content_budget = pad_to.saturating_sub(self.special_tokens);

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), false)
            .map_err(EmbedError::tokenization)?;

        let mut input_ids = Array2::from_elem((texts.len(), pad_to), self.pad_id as i64);
        let mut attention_mask = Array2::<i64>::zeros((texts.len(), pad_to));

        for (row, mut encoding) in encodings.into_iter().enumerate() {
            if encoding.len() > content_budget {
                encoding.truncate(content_budget, 0, TruncationDirection::Right);
            }
            let encoding = self
                .tokenizer
                .post_process(encoding, None, true)
                .map_err(EmbedError::tokenization)?;

            for (col, &id) in encoding.get_ids().iter().take(pad_to).enumerate() {
                input_ids[[row, col]] = id as i64;
                attention_mask[[row, col]] = 1;
            }
        }

        Ok(EncodedBatch {
            input_ids,
            attention_mask,
        })
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.tokenizer
            .decode(ids, skip_special_tokens)
            .map_err(EmbedError::tokenization)
    }

    fn max_sequence_length(&self) -> usize {
        self.max_len
    }
}

/// Read `model_max_length` from a `tokenizer_config.json` next to the tokenizer, if any.
fn model_max_length_from_config(tokenizer_path: &Path) -> Option<usize> {
    let config_path = tokenizer_path.with_file_name(TOKENIZER_CONFIG_FILE);
    let contents = std::fs::read_to_string(&config_path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
    let max = value.get("model_max_length")?.as_f64()?;
    if (1.0..=SANE_MODEL_MAX_LEN as f64).contains(&max) {
        Some(max as usize)
    } else {
        tracing::debug!(
            config = %config_path.display(),
            max,
            "ignoring unbounded model_max_length"
        );
        None
    }
}
