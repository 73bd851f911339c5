//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire up the
//! embedding service and the MCP tool handler into a running server.

use crate::config::SparkConfig;
use crate::embedding::EmbeddingService;
use crate::tools::SparkTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: build the service. The model itself loads on the first request.
fn setup_shared_state(config: &SparkConfig) -> Arc<EmbeddingService> {
    let service = EmbeddingService::from_config(config);
    tracing::info!(
        model = %service.cache().model_path().display(),
        "embedding service ready (model loads on first use)"
    );
    Arc::new(service)
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: SparkConfig) -> Result<()> {
    tracing::info!("starting spark-embed MCP server on stdio");

    let service = setup_shared_state(&config);

    let tools = SparkTools::new(service);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: SparkConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting spark-embed MCP server on HTTP");

    let service = setup_shared_state(&config);

    let mcp = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(SparkTools::new(service.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", mcp);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
