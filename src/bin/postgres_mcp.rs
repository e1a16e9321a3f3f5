//! PostgreSQL tool server speaking MCP over stdio.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use catalog_chat::config::{EnvSnapshot, PostgresSettings};
use catalog_chat::database::PostgresDatabase;
use catalog_chat::logging;
use catalog_chat::mcp::context::PostgresContext;
use catalog_chat::mcp::{resources, tools, McpRegistry, McpServer};

#[derive(Parser, Debug)]
#[command(version, about = "MCP server exposing a PostgreSQL database, read-only")]
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
    let settings = PostgresSettings::from_env(&env).context("Invalid PostgreSQL settings")?;

    match settings.redacted_url() {
        Some(url) => info!("Using PostgreSQL at {}", url),
        None => warn!("MCP_POSTGRES_URL is not set, database tools will report errors"),
    }

    // Connects lazily, on the first tool call
    let database = PostgresDatabase::new(settings.clone());
    let context = PostgresContext {
        env: Arc::new(env),
        settings: Arc::new(settings),
        database: Arc::new(database),
    };

    let mut registry = McpRegistry::new();
    tools::postgres::register_tools(&mut registry);
    resources::postgres::register_resources(&mut registry);

    McpServer::new("postgres-mcp", registry, context)
        .with_instructions(
            "Read-only tools for a PostgreSQL database: list tables, read rows, run SELECT \
             queries and describe table schemas.",
        )
        .serve_stdio()
        .await
}
