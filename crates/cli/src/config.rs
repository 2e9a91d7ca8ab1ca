// CLI configuration.
//
// File: `~/.mobilecoder/config.toml`
// Environment overrides: `MOBILECODER_STORE_PATH`, `MOBILECODER_LOG`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STORE_PATH_ENV: &str = "MOBILECODER_STORE_PATH";
pub const LOG_FILTER_ENV: &str = "MOBILECODER_LOG";

/// Root directory for MobileCoder state: `~/.mobilecoder/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".mobilecoder"))
}

/// Path to the config file: `~/.mobilecoder/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

fn default_store_path() -> PathBuf {
    global_dir().unwrap_or_else(|| PathBuf::from(".mobilecoder")).join("store.db")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database holding accounts, workspaces and files.
    pub store_path: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Colour human output when writing to a terminal.
    pub color: bool,
    /// Text shown before the workspace in the prompt.
    pub prompt_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            log_filter: "warn".into(),
            color: true,
            prompt_name: "MobileCoder".into(),
        }
    }
}

impl Config {
    /// Load from `~/.mobilecoder/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env(self) -> Self {
        self.apply_env_fn(|key| std::env::var(key))
    }

    /// Testable variant that takes an environment lookup function.
    pub fn apply_env_fn<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Some(path) = env(STORE_PATH_ENV).ok().filter(|v| !v.trim().is_empty()) {
            self.store_path = PathBuf::from(path);
        }
        if let Some(filter) = env(LOG_FILTER_ENV).ok().filter(|v| !v.trim().is_empty()) {
            self.log_filter = filter;
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::VarError;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert!(cfg.store_path.ends_with("store.db"));
        assert_eq!(cfg.log_filter, "warn");
        assert!(cfg.color);
        assert_eq!(cfg.prompt_name, "MobileCoder");
    }

    #[test]
    fn roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let cfg = Config {
            store_path: dir.path().join("data.db"),
            log_filter: "mobilecoder_session=debug".into(),
            color: false,
            prompt_name: "MC".into(),
        };
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: Config = toml::from_str("color = false\n").unwrap();
        assert!(!cfg.color);
        assert_eq!(cfg.log_filter, "warn");
        assert_eq!(cfg.prompt_name, "MobileCoder");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = toml::from_str::<Config>("colour = false\n").expect_err("parse should fail");
        assert!(error.to_string().contains("colour"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn env_overrides_store_and_log_filter() {
        let cfg = Config::default().apply_env_fn(|key| match key {
            STORE_PATH_ENV => Ok("/tmp/other.db".into()),
            LOG_FILTER_ENV => Ok("debug".into()),
            _ => Err(VarError::NotPresent),
        });
        assert_eq!(cfg.store_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(cfg.log_filter, "debug");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let cfg = Config::default().apply_env_fn(|_| Ok("  ".into()));
        assert_eq!(cfg, Config::default());
    }
}
