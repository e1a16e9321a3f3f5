use crate::mcp::client::McpServerSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML file for the chat application.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub system_prompt: Option<String>,
    pub max_tool_rounds: Option<usize>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
    pub history_file: Option<String>,

    pub mcp_servers: Vec<McpServerSpec>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
