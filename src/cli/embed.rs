//! CLI `embed` command: embed tags and texts once and print JSON to stdout.

use anyhow::{Context, Result};

use crate::config::SparkConfig;
use crate::embedding::EmbeddingService;

/// Embed `tags` and `texts` with the configured model and print the results.
pub async fn embed(config: &SparkConfig, tags: String, texts: Vec<String>) -> Result<()> {
    let service = EmbeddingService::from_config(config);

    let results = tokio::task::spawn_blocking(move || service.generate_embeddings(&tags, &texts))
        .await?
        .context("embedding failed")?;

    let json = serde_json::to_string_pretty(&results).context("serialization failed")?;
    println!("{json}");
    Ok(())
}
