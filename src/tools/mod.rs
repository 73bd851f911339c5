pub mod generate_embeddings;
pub mod model_info;

use generate_embeddings::GenerateEmbeddingsParams;
use model_info::ModelInfoParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;

use crate::embedding::EmbeddingService;

/// The spark-embed MCP tool handler. Holds the shared embedding service and
/// exposes all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct SparkTools {
    tool_router: ToolRouter<Self>,
    service: Arc<EmbeddingService>,
}

#[tool_router]
impl SparkTools {
    pub fn new(service: Arc<EmbeddingService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    /// Embed tags and free text.
    #[tool(description = "Generate embeddings. Returns one entry per distinct tag, then one per text, each with its L2-normalized vector.")]
    async fn generate_embeddings(
        &self,
        Parameters(params): Parameters<GenerateEmbeddingsParams>,
    ) -> Result<String, String> {
        tracing::info!(
            tags_len = params.tags.len(),
            texts = params.texts.len(),
            "generate_embeddings called"
        );

        // CPU-heavy, and the first call loads the model
        let service = Arc::clone(&self.service);
        let results = tokio::task::spawn_blocking(move || {
            service.generate_embeddings(&params.tags, &params.texts)
        })
        .await
        .map_err(|e| format!("embedding task failed: {e}"))?
        .map_err(|e| e.to_string())?;

        tracing::info!(results = results.len(), "embeddings generated");

        serde_json::to_string(&results).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Describe the loaded model.
    #[tool(description = "Report the embedding model path, vector dimension, and max input length. Loads the model if needed.")]
    async fn model_info(
        &self,
        Parameters(_params): Parameters<ModelInfoParams>,
    ) -> Result<String, String> {
        let service = Arc::clone(&self.service);
        let handle = tokio::task::spawn_blocking(move || service.cache().ensure_loaded())
            .await
            .map_err(|e| format!("model load task failed: {e}"))?
            .map_err(|e| e.to_string())?;

        let policy = self
            .service
            .chunk_policy(&handle)
            .map_err(|e| e.to_string())?;
        Ok(serde_json::json!({
            "model_path": handle.model_path.display().to_string(),
            "output_name": handle.output_name,
            "dimension": handle.embedding_dimension,
            "max_sequence_length": handle.max_sequence_length,
            "chunk_size": policy.chunk_size,
            "stride": policy.stride,
        })
        .to_string())
    }
}

#[tool_handler]
impl ServerHandler for SparkTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "spark-embed turns tags and free text into vectors. Use generate_embeddings \
                 with ';'-delimited tags and a list of texts, and model_info to see the vector size."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
