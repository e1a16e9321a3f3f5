//! Launching the real adapter binaries for tests.

use super::constants::*;
use super::fake_openmetadata::FakeOpenMetadata;
use catalog_chat::mcp::protocol::ToolsCallResult;
use catalog_chat::mcp::{McpClient, McpServerSpec};
use std::time::Duration;
use tempfile::TempDir;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Start an adapter binary with exactly `env` as its environment, in an empty
/// temporary working directory so no stray `.env` is picked up. The
/// directory lives as long as the returned guard.
pub async fn start_adapter(
    name: &str,
    binary: &str,
    env: &[(&str, &str)],
) -> (McpClient, TempDir) {
    let cwd = tempfile::tempdir().expect("Failed to create temp dir");
    let mut spec = McpServerSpec::new(name, binary);
    spec.clear_env = true;
    spec.cwd = Some(cwd.path().to_path_buf());
    for (key, value) in env {
        spec.env.insert(key.to_string(), value.to_string());
    }

    let client = McpClient::connect(spec, REQUEST_TIMEOUT)
        .await
        .expect("Failed to start adapter");
    (client, cwd)
}

/// `catalog-mcp` pointed at the fake catalog with JWT auth.
pub async fn start_catalog_adapter(catalog: &FakeOpenMetadata) -> (McpClient, TempDir) {
    start_adapter(
        "catalog",
        env!("CARGO_BIN_EXE_catalog-mcp"),
        &[
            ("OPENMETADATA_HOST", catalog.base_url.as_str()),
            ("OPENMETADATA_JWT_TOKEN", OM_JWT_TOKEN),
            ("OPENMETADATA_FQN_PREFIXES", OM_FQN_PREFIX),
        ],
    )
    .await
}

/// `postgres-mcp` with the given environment.
pub async fn start_postgres_adapter(env: &[(&str, &str)]) -> (McpClient, TempDir) {
    start_adapter("postgres", env!("CARGO_BIN_EXE_postgres-mcp"), env).await
}

pub fn tool_text(result: &ToolsCallResult) -> &str {
    result.first_text().expect("Tool result has no text")
}
