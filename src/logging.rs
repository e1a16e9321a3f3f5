use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Output goes to stderr since stdout carries
/// either the MCP channel or the chat transcript.
///
/// `LOG_LEVEL` takes `EnvFilter` directives; without it the level is INFO,
/// or DEBUG when `debug` is set.
pub fn init(debug: bool) -> Result<()> {
    let default_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
