//! Configuration loading.
//!
//! Config lives at `${RYL_HOME}/config.toml` (default `~/.ryl`). Every
//! field has a default so a missing file or empty table is a valid
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::ContinuationPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Interpreter command each block is piped to.
    pub command: String,
    /// Seconds to wait for any host response before giving up.
    pub eval_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            eval_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Trailing-backslash handling at dispatch time.
    pub continuation: ContinuationPolicy,
    /// Snippet pre-loaded into the first input surface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<String>,
    /// Submit the bootstrap snippet immediately on startup.
    pub auto_submit: bool,
}

impl Config {
    /// Resolves `${RYL_HOME}`, defaulting to `~/.ryl`.
    pub fn home() -> PathBuf {
        if let Ok(home) = std::env::var("RYL_HOME") {
            return PathBuf::from(home);
        }
        let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(base).join(".ryl")
    }

    pub fn config_path() -> PathBuf {
        Self::home().join("config.toml")
    }

    pub fn logs_dir() -> PathBuf {
        Self::home().join("logs")
    }

    /// Loads the config file, or the defaults when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime.eval_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.runtime.command, "python3");
        assert_eq!(config.eval_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[runtime]\ncommand = \"lua\"\n\n[session]\ncontinuation = \"strip\""
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.runtime.command, "lua");
        assert_eq!(config.runtime.eval_timeout_secs, 30);
        assert_eq!(config.session.continuation, ContinuationPolicy::Strip);
        assert_eq!(config.session.bootstrap, None);
    }

    #[test]
    fn bootstrap_fields_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[session]\nbootstrap = \"print('hi')\"\nauto_submit = true\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.session.bootstrap.as_deref(), Some("print('hi')"));
        assert!(config.session.auto_submit);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[runtime]\ncomand = \"lua\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
