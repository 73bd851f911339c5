#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ndarray::Array2;
use spark_embed::embedding::{
    EmbedError, EmbeddingOptions, EmbeddingService, EncodedBatch, InferenceEngine, ModelCache,
    ModelHandle, ModelLoader, Result, TokenizerAdapter,
};

pub const PAD: u32 = 0;
pub const CLS: u32 = 1;
pub const SEP: u32 = 2;
const FIRST_WORD_ID: u32 = 10;

/// Whitespace tokenizer: one token per word, `[CLS] … [SEP]` when special
/// tokens are requested. Words are interned so decode is exact.
pub struct FakeTokenizer {
    max_len: usize,
    vocab: Mutex<(HashMap<String, u32>, Vec<String>)>,
}

impl FakeTokenizer {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            vocab: Mutex::new((HashMap::new(), Vec::new())),
        }
    }

    fn intern(&self, word: &str) -> u32 {
        let mut vocab = self.vocab.lock().unwrap();
        if let Some(&id) = vocab.0.get(word) {
            return id;
        }
        let id = FIRST_WORD_ID + vocab.1.len() as u32;
        vocab.0.insert(word.to_string(), id);
        vocab.1.push(word.to_string());
        id
    }
}

impl TokenizerAdapter for FakeTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>> {
        if text.contains('\0') {
            return Err(EmbedError::Tokenization("NUL byte in input".into()));
        }
        let mut ids = Vec::new();
        if add_special_tokens {
            ids.push(CLS);
        }
        ids.extend(text.split_whitespace().map(|w| self.intern(w)));
        if add_special_tokens {
            ids.push(SEP);
        }
        Ok(ids)
    }

    fn encode_batch(&self, texts: &[&str], pad_to: usize) -> Result<EncodedBatch> {
        let mut input_ids = Array2::from_elem((texts.len(), pad_to), PAD as i64);
        let mut attention_mask = Array2::zeros((texts.len(), pad_to));
        for (row, text) in texts.iter().enumerate() {
            let mut content = self.encode(text, false)?;
            content.truncate(pad_to.saturating_sub(2));
            let ids: Vec<u32> = std::iter::once(CLS)
                .chain(content)
                .chain(std::iter::once(SEP))
                .take(pad_to)
                .collect();
            for (col, id) in ids.into_iter().enumerate() {
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
        let vocab = self.vocab.lock().unwrap();
        let words: Vec<&str> = ids
            .iter()
            .filter_map(|&id| match id {
                PAD => (!skip_special_tokens).then_some("[PAD]"),
                CLS => (!skip_special_tokens).then_some("[CLS]"),
                SEP => (!skip_special_tokens).then_some("[SEP]"),
                id => vocab.1.get((id - FIRST_WORD_ID) as usize).map(String::as_str),
            })
            .collect();
        Ok(words.join(" "))
    }

    fn max_sequence_length(&self) -> usize {
        self.max_len
    }
}

/// Deterministic engine: each token id maps to a fixed positive feature
/// vector, and the output row is the mean over unmasked positions, so
/// padding never changes a row.
pub struct FakeEngine {
    dim: usize,
    calls: Mutex<Vec<(usize, usize)>>,
    fail: AtomicBool,
}

impl FakeEngine {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// `(batch_size, seq_len)` of every call so far.
    pub fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_next_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn token_feature(id: i64, d: usize) -> f32 {
        ((id as usize * 31 + d * 17) % 13 + 1) as f32
    }
}

impl InferenceEngine for FakeEngine {
    fn infer(&self, batch: &EncodedBatch) -> Result<Array2<f32>> {
        self.calls
            .lock()
            .unwrap()
            .push((batch.batch_size(), batch.seq_len()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbedError::Inference("out of memory".into()));
        }

        let mut out = Array2::zeros((batch.batch_size(), self.dim));
        for b in 0..batch.batch_size() {
            let mut count = 0.0f32;
            for s in 0..batch.seq_len() {
                if batch.attention_mask[[b, s]] == 0 {
                    continue;
                }
                let id = batch.input_ids[[b, s]];
                for d in 0..self.dim {
                    out[[b, d]] += Self::token_feature(id, d);
                }
                count += 1.0;
            }
            if count > 0.0 {
                out.row_mut(b).mapv_inplace(|x| x / count);
            }
        }
        Ok(out)
    }

    fn output_name(&self) -> &str {
        "sentence_embedding"
    }

    fn embedding_dimension(&self) -> usize {
        self.dim
    }
}

/// Loader handing out shared fakes and counting how often it runs.
pub struct FakeLoader {
    pub tokenizer: Arc<FakeTokenizer>,
    pub engine: Arc<FakeEngine>,
    pub loads: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl ModelLoader for FakeLoader {
    fn load(&self, model_path: &Path) -> Result<ModelHandle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(ModelHandle::new(
            model_path,
            self.tokenizer.clone(),
            self.engine.clone(),
        ))
    }
}

pub struct Fixture {
    pub service: EmbeddingService,
    pub engine: Arc<FakeEngine>,
    pub tokenizer: Arc<FakeTokenizer>,
    pub loads: Arc<AtomicUsize>,
}

/// Service over fakes with the given model limit and vector size.
pub fn fixture(max_len: usize, dim: usize) -> Fixture {
    fixture_with(max_len, dim, EmbeddingOptions::default(), Duration::ZERO)
}

pub fn fixture_with(
    max_len: usize,
    dim: usize,
    options: EmbeddingOptions,
    delay: Duration,
) -> Fixture {
    let tokenizer = Arc::new(FakeTokenizer::new(max_len));
    let engine = Arc::new(FakeEngine::new(dim));
    let loads = Arc::new(AtomicUsize::new(0));
    let loader = FakeLoader {
        tokenizer: tokenizer.clone(),
        engine: engine.clone(),
        loads: loads.clone(),
        delay,
    };
    let cache = Arc::new(ModelCache::new("/models/fake/model.onnx", loader));
    Fixture {
        service: EmbeddingService::new(cache, options),
        engine,
        tokenizer,
        loads,
    }
}

/// `n` distinct words: "w0 w1 … w{n-1}".
pub fn words(n: usize) -> String {
    (0..n)
        .map(|i| format!("w{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
