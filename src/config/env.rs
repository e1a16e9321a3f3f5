use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_ENV_FILE: &str = ".env";

/// Environment captured once at startup: the process environment plus the
/// entries of a `.env` file. Process variables win over file entries.
/// Empty values are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
    file_vars: BTreeMap<String, String>,
    env_file: Option<PathBuf>,
}

impl EnvSnapshot {
    /// Capture the process environment and overlay `env_file`, or `./.env`
    /// when no file is given and one exists.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let process: BTreeMap<String, String> = std::env::vars().collect();

        let (path, required) = match env_file {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_ENV_FILE), false),
        };

        let file_vars = if path.is_file() {
            read_env_file(&path)?
        } else if required {
            anyhow::bail!("Env file does not exist: {:?}", path);
        } else {
            BTreeMap::new()
        };

        debug!(
            "Loaded {} variables from {:?}",
            file_vars.len(),
            path.display()
        );

        Ok(Self::from_parts(
            process,
            file_vars,
            path.is_file().then_some(path),
        ))
    }

    fn from_parts(
        process: BTreeMap<String, String>,
        file_vars: BTreeMap<String, String>,
        env_file: Option<PathBuf>,
    ) -> Self {
        let mut vars = file_vars.clone();
        vars.extend(process);
        Self {
            vars,
            file_vars,
            env_file,
        }
    }

    /// Build a snapshot from explicit pairs, without touching the process.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            file_vars: BTreeMap::new(),
            env_file: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parse a variable, falling back to `default` when unset.
    pub fn parse_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e)),
            None => Ok(default),
        }
    }

    /// Entries that came from the env file
    pub fn file_vars(&self) -> &BTreeMap<String, String> {
        &self.file_vars
    }

    pub fn env_file(&self) -> Option<&Path> {
        self.env_file.as_deref()
    }

    /// One `- NAME: value` line, with secrets reduced to SET / NOT SET.
    pub fn describe(&self, name: &str, secret: bool) -> String {
        let value = match (self.get(name), secret) {
            (None, _) => "NOT SET",
            (Some(_), true) => "SET",
            (Some(value), false) => value,
        };
        format!("- {}: {}", name, value)
    }
}

fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read env file: {:?}", path))?;
    let mut vars = BTreeMap::new();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("Failed to parse env file: {:?}", path))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Working directory and whether it holds a `.env` file, as shown by the
/// adapters' debug tools.
pub fn working_dir_report() -> String {
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|e| format!("unavailable ({})", e));
    let has_env_file = Path::new(DEFAULT_ENV_FILE).is_file();
    format!(
        "Working directory: {}\n.env file exists: {}",
        cwd, has_env_file
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_values_are_unset() {
        let env = EnvSnapshot::from_pairs([("A", "  "), ("B", "x")]);
        assert!(!env.is_set("A"));
        assert_eq!(env.get("B"), Some("x"));
        assert_eq!(env.get("C"), None);
    }

    #[test]
    fn test_process_values_win_over_file() {
        let process = BTreeMap::from([("SHARED".to_string(), "process".to_string())]);
        let file = BTreeMap::from([
            ("SHARED".to_string(), "file".to_string()),
            ("ONLY_FILE".to_string(), "file".to_string()),
        ]);
        let env = EnvSnapshot::from_parts(process, file, None);
        assert_eq!(env.get("SHARED"), Some("process"));
        assert_eq!(env.get("ONLY_FILE"), Some("file"));
        assert_eq!(env.file_vars().len(), 2);
    }

    #[test]
    fn test_load_explicit_env_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "CATALOG_CHAT_TEST_ONLY_VAR=from-file").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "QUOTED=\"with spaces\"").unwrap();

        let env = EnvSnapshot::load(Some(file.path())).unwrap();
        assert_eq!(env.get("CATALOG_CHAT_TEST_ONLY_VAR"), Some("from-file"));
        assert_eq!(env.file_vars().get("QUOTED").map(String::as_str), Some("with spaces"));
        assert_eq!(env.env_file(), Some(file.path()));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = EnvSnapshot::load(Some(Path::new("/nonexistent/.env")));
        assert!(result.is_err());
    }

    #[test]
    fn test_describe_hides_secrets() {
        let env = EnvSnapshot::from_pairs([("HOST", "http://h"), ("TOKEN", "abc")]);
        assert_eq!(env.describe("HOST", false), "- HOST: http://h");
        assert_eq!(env.describe("TOKEN", true), "- TOKEN: SET");
        assert_eq!(env.describe("USER", false), "- USER: NOT SET");
    }

    #[test]
    fn test_parse_or() {
        let env = EnvSnapshot::from_pairs([("N", "42"), ("BAD", "x")]);
        assert_eq!(env.parse_or("N", 1u64).unwrap(), 42);
        assert_eq!(env.parse_or("MISSING", 7u64).unwrap(), 7);
        assert!(env.parse_or::<u64>("BAD", 1).is_err());
    }
}
