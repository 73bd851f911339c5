mod cli;
mod server;
mod tools;

use spark_embed::{config, embedding};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spark-embed", version, about = "Tag and text embedding service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport unless --http or config says otherwise)
    Serve {
        /// Serve over Streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Embed tags and texts once and print the results as JSON
    Embed {
        /// `;`-delimited tags, e.g. "trains; toys"
        #[arg(long, default_value = "")]
        tags: String,
        /// Free-text inputs, one result each
        texts: Vec<String>,
    },
    /// Check model artifacts and load the model
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to the configured model directory
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::SparkConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC and `embed` output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Embed { tags, texts } => {
            cli::embed::embed(&config, tags, texts).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.model).await?;
            }
        },
    }

    Ok(())
}
