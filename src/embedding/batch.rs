//! Bounded batches, padded to their own longest member.

use ndarray::{Array2, Axis};

use super::{EmbedError, InferenceEngine, Result, TokenizerAdapter};

/// Texts per engine call when embedding chunks of long documents.
pub const CHUNK_BATCH_SIZE: usize = 8;
/// Texts per engine call when embedding tags. Tags are short, so batches are wide.
pub const TAG_BATCH_SIZE: usize = 128;

/// How far a batch may be padded.
///
/// Each batch is padded to its longest member (special tokens included),
/// never past `max_length`. Longer members are truncated to `max_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadPolicy {
    pub max_length: usize,
}

/// Run `texts` through the engine in batches of at most `batch_size`.
///
/// Returns one row per input text, in input order. An engine failure aborts
/// the whole call.
pub fn run_batches(
    tokenizer: &dyn TokenizerAdapter,
    engine: &dyn InferenceEngine,
    texts: &[&str],
    batch_size: usize,
    pad_policy: PadPolicy,
) -> Result<Array2<f32>> {
    if batch_size == 0 || pad_policy.max_length == 0 {
        return Err(EmbedError::InvalidConfig(format!(
            "batch_size ({batch_size}) and max_length ({}) must be positive",
            pad_policy.max_length
        )));
    }

    let dim = engine.embedding_dimension();
    let mut rows = Vec::with_capacity(texts.len().div_ceil(batch_size));

    for batch in texts.chunks(batch_size) {
        let longest = batch
            .iter()
            .map(|t| tokenizer.encode(t, true).map(|ids| ids.len()))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .max()
            .unwrap_or(0);
        let pad_to = longest.clamp(1, pad_policy.max_length);

        let encoded = tokenizer.encode_batch(batch, pad_to)?;
        tracing::debug!(items = batch.len(), pad_to, "dispatching batch");

        let out = engine.infer(&encoded)?;
        if out.nrows() != batch.len() || out.ncols() != dim {
            return Err(EmbedError::Inference(format!(
                "engine returned {}x{} for a batch of {} (dimension {dim})",
                out.nrows(),
                out.ncols(),
                batch.len()
            )));
        }
        rows.push(out);
    }

    if rows.is_empty() {
        return Ok(Array2::zeros((0, dim)));
    }
    let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
    ndarray::concatenate(Axis(0), &views).map_err(EmbedError::inference)
}
