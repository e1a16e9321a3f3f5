mod env;
mod file_config;
mod settings;

pub use env::{working_dir_report, EnvSnapshot, DEFAULT_ENV_FILE};
pub use file_config::FileConfig;
pub use settings::{
    vars, CatalogAuth, CatalogSettings, LlmSettings, PostgresSettings, DEFAULT_AZURE_API_VERSION,
};

use crate::mcp::client::McpServerSpec;
use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "chat.toml";

/// CLI arguments of the chat application that take part in config resolution.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub max_tool_rounds: usize,
    pub request_timeout_secs: u64,
    pub tool_timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 1,
            request_timeout_secs: 120,
            tool_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub system_prompt: Option<String>,
    /// Completions that may request tools before the final reply
    pub max_tool_rounds: usize,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub request_timeout: Duration,
    pub tool_timeout: Duration,
    pub history_file: Option<PathBuf>,
}

/// Resolved chat application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub chat: ChatSettings,
    pub mcp_servers: Vec<McpServerSpec>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments, the optional TOML file and
    /// the environment. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>, env: &EnvSnapshot) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let llm = LlmSettings::from_env(env)?;

        let max_tool_rounds = file.max_tool_rounds.unwrap_or(cli.max_tool_rounds);
        if max_tool_rounds == 0 {
            bail!("max_tool_rounds must be at least 1");
        }

        let temperature = file.temperature.unwrap_or(0.3);
        if !(0.0..=2.0).contains(&temperature) {
            bail!("temperature must be between 0.0 and 2.0, got {}", temperature);
        }

        let request_timeout_secs = file
            .request_timeout_secs
            .unwrap_or(cli.request_timeout_secs);
        let tool_timeout_secs = file.tool_timeout_secs.unwrap_or(cli.tool_timeout_secs);
        if request_timeout_secs == 0 || tool_timeout_secs == 0 {
            bail!("timeouts must be greater than zero");
        }

        let chat = ChatSettings {
            system_prompt: file.system_prompt.filter(|p| !p.trim().is_empty()),
            max_tool_rounds,
            temperature,
            max_tokens: file.max_tokens,
            request_timeout: Duration::from_secs(request_timeout_secs),
            tool_timeout: Duration::from_secs(tool_timeout_secs),
            history_file: file.history_file.map(PathBuf::from),
        };

        let mut names = BTreeSet::new();
        let mut mcp_servers = Vec::with_capacity(file.mcp_servers.len());
        for mut spec in file.mcp_servers {
            if spec.name.trim().is_empty() {
                bail!("mcp_servers entries need a name");
            }
            if spec.command.trim().is_empty() {
                bail!("mcp_servers entry {:?} has an empty command", spec.name);
            }
            if !names.insert(spec.name.clone()) {
                bail!("Duplicate mcp_servers name: {:?}", spec.name);
            }
            // Entries from the env file reach the adapters unless the
            // server entry sets them itself
            for (key, value) in env.file_vars() {
                spec.env.entry(key.clone()).or_insert_with(|| value.clone());
            }
            mcp_servers.push(spec);
        }

        Ok(AppConfig {
            llm,
            chat,
            mcp_servers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure_env() -> EnvSnapshot {
        EnvSnapshot::from_pairs([
            (vars::AZURE_OPENAI_ENDPOINT, "https://example.openai.azure.com"),
            (vars::AZURE_OPENAI_API_KEY, "key"),
            (vars::AZURE_OPENAI_DEPLOYMENT_NAME, "gpt-4o"),
        ])
    }

    #[test]
    fn test_resolve_defaults_without_file() {
        let config = AppConfig::resolve(&CliConfig::default(), None, &azure_env()).unwrap();
        assert_eq!(config.chat.max_tool_rounds, 1);
        assert_eq!(config.chat.temperature, 0.3);
        assert_eq!(config.chat.request_timeout, Duration::from_secs(120));
        assert!(config.chat.system_prompt.is_none());
        assert!(config.mcp_servers.is_empty());
        assert_eq!(config.llm.deployment, "gpt-4o");
    }

    #[test]
    fn test_file_overrides_cli() {
        let cli = CliConfig {
            max_tool_rounds: 2,
            ..Default::default()
        };
        let file: FileConfig = toml::from_str(
            r#"
            system_prompt = "Be brief."
            max_tool_rounds = 4
            tool_timeout_secs = 5

            [[mcp_servers]]
            name = "postgres"
            command = "postgres-mcp"
            "#,
        )
        .unwrap();
        let config = AppConfig::resolve(&cli, Some(file), &azure_env()).unwrap();
        assert_eq!(config.chat.max_tool_rounds, 4);
        assert_eq!(config.chat.tool_timeout, Duration::from_secs(5));
        assert_eq!(config.chat.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.mcp_servers[0].command, "postgres-mcp");
    }

    #[test]
    fn test_resolve_fails_without_azure_vars() {
        let err = AppConfig::resolve(&CliConfig::default(), None, &EnvSnapshot::default())
            .unwrap_err()
            .to_string();
        assert!(err.contains("AZURE_OPENAI_ENDPOINT"));
    }

    #[test]
    fn test_duplicate_server_names_rejected() {
        let file: FileConfig = toml::from_str(
            r#"
            [[mcp_servers]]
            name = "a"
            command = "x"

            [[mcp_servers]]
            name = "a"
            command = "y"
            "#,
        )
        .unwrap();
        let err = AppConfig::resolve(&CliConfig::default(), Some(file), &azure_env())
            .unwrap_err()
            .to_string();
        assert!(err.contains("Duplicate"));
    }

    #[test]
    fn test_zero_tool_rounds_rejected() {
        let file = FileConfig {
            max_tool_rounds: Some(0),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&CliConfig::default(), Some(file), &azure_env()).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let parsed: Result<FileConfig, _> = toml::from_str("max_tool_round = 3");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chat.toml");
        std::fs::write(&path, "temperature = 0.7\n").unwrap();
        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.temperature, Some(0.7));

        assert!(FileConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
