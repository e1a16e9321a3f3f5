//! OpenMetadata tool server speaking MCP over stdio.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use catalog_chat::catalog::OpenMetadataClient;
use catalog_chat::config::{CatalogSettings, EnvSnapshot};
use catalog_chat::logging;
use catalog_chat::mcp::context::CatalogContext;
use catalog_chat::mcp::{resources, tools, McpRegistry, McpServer};

#[derive(Parser, Debug)]
#[command(version, about = "MCP server exposing an OpenMetadata catalog")]
struct CliArgs {
    /// Env file to read before the process environment, `.env` by default.
    #[clap(long)]
    pub env_file: Option<PathBuf>,

    /// Log at debug level unless LOG_LEVEL says otherwise.
    #[clap(short, long)]
    pub debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    logging::init(cli_args.debug)?;

    let env = EnvSnapshot::load(cli_args.env_file.as_deref())?;
    let settings = CatalogSettings::from_env(&env).context("Invalid OpenMetadata settings")?;

    let missing = settings.missing_vars();
    if missing.is_empty() {
        info!(
            "Using OpenMetadata at {}",
            settings.host.as_deref().unwrap_or_default()
        );
    } else {
        warn!(
            "Missing environment variables: {}, catalog tools will report errors",
            missing.join(", ")
        );
    }

    let catalog = OpenMetadataClient::new(settings.clone())
        .context("Failed to create OpenMetadata client")?;
    let context = CatalogContext {
        env: Arc::new(env),
        settings: Arc::new(settings),
        catalog: Arc::new(catalog),
    };

    let mut registry = McpRegistry::new();
    tools::catalog::register_tools(&mut registry);
    resources::catalog::register_resources(&mut registry);

    McpServer::new("openmetadata-mcp", registry, context)
        .with_instructions(
            "Tools for browsing an OpenMetadata catalog: list tables, inspect a table's \
             columns and constraints, and check connectivity.",
        )
        .serve_stdio()
        .await
}
