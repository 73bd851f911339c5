use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SparkConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub model_dir: String,
    pub model_file: String,
    pub tokenizer_file: String,
    pub intra_threads: usize,
    /// Overrides the max input length declared by the tokenizer files.
    pub max_sequence_length: Option<usize>,
    pub model_url: String,
    pub tokenizer_url: String,
    /// Source of `tokenizer_config.json`, which declares `model_max_length`.
    pub tokenizer_config_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub stride: usize,
    pub chunk_batch_size: usize,
    pub tag_batch_size: usize,
    pub tag_max_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8090,
            log_level: "info".into(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let model_dir = default_spark_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            model_dir,
            model_file: "model.onnx".into(),
            tokenizer_file: "tokenizer.json".into(),
            intra_threads: 4,
            max_sequence_length: None,
            model_url:
                "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx"
                    .into(),
            tokenizer_url:
                "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json"
                    .into(),
            tokenizer_config_url:
                "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer_config.json"
                    .into(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            stride: 64,
            chunk_batch_size: 8,
            tag_batch_size: 128,
            tag_max_length: 64,
        }
    }
}

impl ModelConfig {
    /// Full path of the ONNX model file, `~` expanded.
    pub fn model_path(&self) -> PathBuf {
        expand_tilde(&self.model_dir).join(&self.model_file)
    }

    /// Full path of the tokenizer file, `~` expanded.
    pub fn tokenizer_path(&self) -> PathBuf {
        expand_tilde(&self.model_dir).join(&self.tokenizer_file)
    }

    /// Full path of `tokenizer_config.json`, next to the tokenizer.
    pub fn tokenizer_config_path(&self) -> PathBuf {
        self.tokenizer_path()
            .with_file_name(crate::embedding::tokenizer::TOKENIZER_CONFIG_FILE)
    }
}

/// Returns `~/.spark-embed/`
pub fn default_spark_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spark-embed")
}

/// Returns the default config file path: `~/.spark-embed/config.toml`
pub fn default_config_path() -> PathBuf {
    default_spark_dir().join("config.toml")
}

impl SparkConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            SparkConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (SPARK_EMBED_MODEL_DIR, SPARK_EMBED_MODEL_FILE, SPARK_EMBED_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SPARK_EMBED_MODEL_DIR") {
            self.model.model_dir = val;
        }
        if let Ok(val) = std::env::var("SPARK_EMBED_MODEL_FILE") {
            self.model.model_file = val;
        }
        if let Ok(val) = std::env::var("SPARK_EMBED_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        anyhow::ensure!(p.chunk_size > 0, "pipeline.chunk_size must be positive");
        anyhow::ensure!(
            p.stride < p.chunk_size,
            "pipeline.stride ({}) must be smaller than pipeline.chunk_size ({})",
            p.stride,
            p.chunk_size
        );
        anyhow::ensure!(
            p.chunk_batch_size > 0 && p.tag_batch_size > 0,
            "batch sizes must be positive"
        );
        anyhow::ensure!(p.tag_max_length > 0, "pipeline.tag_max_length must be positive");
        Ok(())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
