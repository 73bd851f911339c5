//! Token-window chunking for texts longer than the model accepts.
//!
//! A text is encoded once without special tokens. Windows of `chunk_size`
//! tokens step forward by `chunk_size - stride`, so consecutive windows share
//! exactly `stride` tokens, and the last window ends on the final token.
//! Each window is decoded back to text for the batch pass.
//!
//! ```text
//! 1000 tokens, chunk_size 256, stride 64:
//! [0-256] [192-448] [384-640] [576-832] [768-1000]
//! ```

use super::{EmbedError, Result, TokenizerAdapter};

pub const DEFAULT_CHUNK_SIZE: usize = 256;
pub const DEFAULT_STRIDE: usize = 64;

/// One window of a longer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Index of the text this chunk came from in the caller's input.
    pub owning_text_index: usize,
    pub text: String,
    pub token_count: usize,
}

/// Window width and overlap, in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub chunk_size: usize,
    pub stride: usize,
}

impl ChunkPolicy {
    /// `chunk_size = min(chunk_size, max_len)`, `stride = min(stride, chunk_size / 2)`.
    pub fn clamped(chunk_size: usize, stride: usize, max_len: usize) -> Self {
        let chunk_size = chunk_size.min(max_len);
        Self {
            chunk_size,
            stride: stride.min(chunk_size / 2),
        }
    }

    /// The 256/64 policy, clamped to the model limit.
    pub fn for_model(max_len: usize) -> Self {
        Self::clamped(DEFAULT_CHUNK_SIZE, DEFAULT_STRIDE, max_len)
    }

    fn step(&self) -> Result<usize> {
        if self.chunk_size == 0 || self.stride >= self.chunk_size {
            return Err(EmbedError::InvalidConfig(format!(
                "stride ({}) must be smaller than chunk_size ({})",
                self.stride, self.chunk_size
            )));
        }
        Ok(self.chunk_size - self.stride)
    }
}

/// Split `text` into overlapping token windows.
///
/// Empty text yields a single empty chunk; text that already fits yields
/// itself unchanged, without a decode round trip.
pub fn chunk(
    tokenizer: &dyn TokenizerAdapter,
    owning_text_index: usize,
    text: &str,
    policy: ChunkPolicy,
) -> Result<Vec<Chunk>> {
    let step = policy.step()?;

    if text.is_empty() {
        return Ok(vec![Chunk {
            owning_text_index,
            text: String::new(),
            token_count: 0,
        }]);
    }

    let ids = tokenizer.encode(text, false)?;
    if ids.len() <= policy.chunk_size {
        return Ok(vec![Chunk {
            owning_text_index,
            text: text.to_string(),
            token_count: ids.len(),
        }]);
    }

    let mut chunks = Vec::with_capacity(ids.len().div_ceil(step));
    let mut start = 0;
    loop {
        let end = (start + policy.chunk_size).min(ids.len());
        chunks.push(Chunk {
            owning_text_index,
            text: tokenizer.decode(&ids[start..end], true)?,
            token_count: end - start,
        });
        if end >= ids.len() {
            break;
        }
        start += step;
    }

    tracing::debug!(
        owning_text_index,
        tokens = ids.len(),
        chunks = chunks.len(),
        chunk_size = policy.chunk_size,
        stride = policy.stride,
        "text chunked"
    );

    Ok(chunks)
}
