use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use catalog_chat::chat::style::get_styles;
use catalog_chat::chat::{ChatApp, ConfigSource};
use catalog_chat::config::{CliConfig, DEFAULT_CONFIG_FILE};
use catalog_chat::logging;

#[derive(Parser, Debug)]
#[command(styles = get_styles(), version, about = "Chat with your data catalog")]
struct CliArgs {
    /// TOML configuration file. `chat.toml` is read when present.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Env file to read before the process environment, `.env` by default.
    #[clap(long)]
    pub env_file: Option<PathBuf>,

    /// Reload configuration when the config file or env file changes.
    #[clap(short, long)]
    pub watch: bool,

    /// Log at debug level unless LOG_LEVEL says otherwise.
    #[clap(short, long)]
    pub debug: bool,

    /// Completions per turn that may call tools. The config file wins.
    #[clap(long, default_value_t = 1)]
    pub max_tool_rounds: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    logging::init(cli_args.debug)?;

    let source = ConfigSource {
        cli: CliConfig {
            max_tool_rounds: cli_args.max_tool_rounds,
            ..Default::default()
        },
        config_required: cli_args.config.is_some(),
        config_path: cli_args
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        env_file: cli_args.env_file,
    };

    let config = source.load()?;
    info!(
        endpoint = %config.llm.endpoint,
        deployment = %config.llm.deployment,
        api_version = %config.llm.api_version,
        "Using Azure OpenAI"
    );
    info!(
        "{} MCP servers configured, max {} tool rounds per turn",
        config.mcp_servers.len(),
        config.chat.max_tool_rounds
    );

    ChatApp::new(source, config).run(cli_args.watch).await
}
