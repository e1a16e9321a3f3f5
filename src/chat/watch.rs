//! Configuration sources of the chat application and change detection.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Result};

use crate::config::{AppConfig, CliConfig, EnvSnapshot, FileConfig, DEFAULT_ENV_FILE};
use crate::mcp::client::McpServerSpec;

/// Where the chat configuration comes from, so it can be read again.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub cli: CliConfig,
    pub config_path: PathBuf,
    /// Set when the path was given explicitly and must exist
    pub config_required: bool,
    pub env_file: Option<PathBuf>,
}

impl ConfigSource {
    pub fn load(&self) -> Result<AppConfig> {
        let env = EnvSnapshot::load(self.env_file.as_deref())?;
        let file = if self.config_path.is_file() {
            Some(FileConfig::load(&self.config_path)?)
        } else if self.config_required {
            bail!("Config file not found: {:?}", self.config_path);
        } else {
            None
        };
        AppConfig::resolve(&self.cli, file, &env)
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        vec![
            self.config_path.clone(),
            self.env_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE)),
        ]
    }
}

/// Polls modification times. Creating or deleting a file counts as a change.
pub struct ConfigWatcher {
    paths: Vec<PathBuf>,
    stamps: Vec<Option<SystemTime>>,
}

impl ConfigWatcher {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let stamps = paths.iter().map(|p| modified(p)).collect();
        Self { paths, stamps }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// True when any file changed since the previous call.
    pub fn poll_changed(&mut self) -> bool {
        let stamps: Vec<_> = self.paths.iter().map(|p| modified(p)).collect();
        let changed = stamps != self.stamps;
        self.stamps = stamps;
        changed
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Server changes needed to go from the running configuration to a new one.
#[derive(Debug, Default, PartialEq)]
pub struct ReloadPlan {
    pub stop: Vec<String>,
    pub start: Vec<McpServerSpec>,
}

impl ReloadPlan {
    pub fn is_empty(&self) -> bool {
        self.stop.is_empty() && self.start.is_empty()
    }
}

/// Servers that disappeared or changed are stopped, changed and new ones
/// started. Unchanged servers keep running. Names in `attached` belong to
/// servers connected by hand and are never started over them.
pub fn plan_reload(
    running: &BTreeMap<String, McpServerSpec>,
    desired: &[McpServerSpec],
    attached: &BTreeSet<String>,
) -> ReloadPlan {
    let mut plan = ReloadPlan::default();

    for (name, spec) in running {
        match desired.iter().find(|d| &d.name == name) {
            Some(d) if d == spec => {}
            _ => plan.stop.push(name.clone()),
        }
    }

    for spec in desired {
        if attached.contains(&spec.name) {
            continue;
        }
        if running.get(&spec.name) != Some(spec) {
            plan.start.push(spec.clone());
        }
    }

    plan
}
