//! CLI `doctor` command: check model artifacts, load the model, print a report.

use anyhow::{Context, Result};

use crate::config::SparkConfig;
use crate::embedding::EmbeddingService;

/// Check the configured model and print a health report.
pub fn doctor(config: &SparkConfig) -> Result<()> {
    let model_path = config.model.model_path();
    let tokenizer_path = config.model.tokenizer_path();

    println!("spark-embed Health Report");
    println!("=========================");
    println!();
    println!("Model file:        {}", describe(&model_path));
    println!("Tokenizer file:    {}", describe(&tokenizer_path));
    println!(
        "Tokenizer config:  {}",
        describe(&config.model.tokenizer_config_path())
    );

    if !model_path.exists() || !tokenizer_path.exists() {
        println!();
        println!("Run `spark-embed model download` to fetch the missing files.");
        return Ok(());
    }

    let service = EmbeddingService::from_config(config);
    let handle = service
        .cache()
        .ensure_loaded()
        .context("failed to load model (artifacts may be corrupt)")?;

    let options = service.options();
    let policy = service.chunk_policy(&handle)?;

    println!();
    println!("Model:");
    println!("  Output tensor:   {}", handle.output_name);
    println!("  Dimension:       {}", handle.embedding_dimension);
    println!("  Max length:      {}", handle.max_sequence_length);
    println!();
    println!("Pipeline:");
    println!("  Chunk size:      {}", policy.chunk_size);
    println!("  Stride:          {}", policy.stride);
    println!("  Chunk batch:     {}", options.chunk_batch_size);
    println!("  Tag batch:       {}", options.tag_batch_size);

    let probe = service
        .generate_embeddings("", &["canoe".to_string()])
        .context("probe embedding failed")?;
    let norm = crate::embedding::aggregate::l2_norm(&probe[0].embedding);
    println!();
    if (norm - 1.0).abs() < 1e-4 {
        println!("Probe embedding:   PASSED (norm {norm:.6})");
    } else {
        println!("Probe embedding:   FAILED (norm {norm:.6}, expected 1.0)");
    }

    Ok(())
}

fn describe(path: &std::path::Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => format!("{} ({})", path.display(), format_bytes(meta.len())),
        Err(_) => format!("{} (missing)", path.display()),
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
