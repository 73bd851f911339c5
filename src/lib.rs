//! Embeddings for tags and long-form text.
//!
//! spark-embed turns short `;`-delimited tag strings and arbitrary-length
//! free text into fixed-size, L2-normalized vectors suitable for similarity
//! search.
//!
//! Texts that fit the model are embedded directly. Longer ones are split into
//! overlapping token windows, the windows are embedded in small batches, and
//! their vectors are averaged into one document vector.
//!
//! # Architecture
//!
//! - **Tokenizer**: HuggingFace `tokenizers`, loaded from `tokenizer.json`
//! - **Inference**: ONNX Runtime via `ort`, pooled or per-token outputs
//! - **Cache**: one lazily loaded model per process, shared behind an `Arc`
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`embedding`]: Chunking, batching, aggregation and the [`embedding::EmbeddingService`] facade

pub mod config;
pub mod embedding;
