//! PiperConfig - `piper.toml` から読む設定
//!
//! None of these settings affect matching. They tell the host where the
//! incoming endpoint lives, which namespace controllers are registered
//! under, whether to load a pipes file, and which queue jobs go through.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PiperConfig {
    /// Path of the webhook endpoint, without surrounding slashes.
    #[serde(default = "default_incoming_request_path")]
    pub incoming_request_path: String,

    /// Namespace prefixed to controller references of loaded pipes.
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub load_pipes_file: bool,

    #[serde(default = "default_pipes_file")]
    pub pipes_file: PathBuf,

    /// Queue the incoming endpoint pushes jobs onto.
    #[serde(default = "default_queue")]
    pub queue: String,

    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_incoming_request_path() -> String {
    "handle-notification".into()
}

fn default_pipes_file() -> PathBuf {
    PathBuf::from("pipes.toml")
}

fn default_queue() -> String {
    "default".into()
}

fn default_workers() -> usize {
    1
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            incoming_request_path: default_incoming_request_path(),
            namespace: None,
            load_pipes_file: false,
            pipes_file: default_pipes_file(),
            queue: default_queue(),
            workers: default_workers(),
        }
    }
}

impl PiperConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Incoming path without surrounding slashes.
    pub fn incoming_path(&self) -> &str {
        self.incoming_request_path.trim_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PiperConfig::from_toml_str("").unwrap();
        assert_eq!(config, PiperConfig::default());
        assert_eq!(config.incoming_path(), "handle-notification");
        assert_eq!(config.queue, "default");
        assert_eq!(config.workers, 1);
        assert!(!config.load_pipes_file);
    }

    #[test]
    fn values_override_defaults() {
        let config = PiperConfig::from_toml_str(
            r#"
            incoming_request_path = "/hooks/telegram/"
            namespace = "Bot\\Pipes"
            load_pipes_file = true
            pipes_file = "config/pipes.toml"
            queue = "pipes"
            workers = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.incoming_path(), "hooks/telegram");
        assert_eq!(config.namespace.as_deref(), Some("Bot\\Pipes"));
        assert_eq!(config.pipes_file, PathBuf::from("config/pipes.toml"));
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = PiperConfig::from_toml_str("queu = \"typo\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = PiperConfig::load_from("does/not/exist/piper.toml").unwrap();
        assert_eq!(config, PiperConfig::default());
    }
}
