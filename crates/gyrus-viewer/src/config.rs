//! Viewer configuration, loaded from a TOML file with per-section defaults

use anyhow::Result;
use bevy::prelude::Resource;
use gyrus_client::DEFAULT_DESCRIBE_ENDPOINT;
use gyrus_core::DEFAULT_TARGET_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Top-level configuration, one section per subsystem
#[derive(Debug, Clone, Serialize, Deserialize, Resource)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub describe: DescribeConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the scan conversion service
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeConfig {
    /// Description service endpoint
    #[serde(default = "default_describe_endpoint")]
    pub endpoint: String,
    /// API key; analysis is disabled when absent
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_describe_endpoint(),
            api_key: None,
        }
    }
}

fn default_describe_endpoint() -> String {
    DEFAULT_DESCRIBE_ENDPOINT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Largest dimension of the model after fit-to-view normalization
    #[serde(default = "default_target_size")]
    pub target_size: f32,
    /// Directory for downloaded models
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_target_size() -> f32 {
    DEFAULT_TARGET_SIZE
}

fn default_cache_dir() -> String {
    "./cache".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Speak analysis results aloud
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Text-to-speech command; the text is passed as the last argument
    #[serde(default = "default_speech_command")]
    pub command: String,
    /// Extra arguments placed before the text
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_speech_command(),
            args: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_speech_command() -> String {
    "espeak".to_string()
}

/// Reads the config file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config {
            backend: BackendConfig::default(),
            describe: DescribeConfig::default(),
            viewer: ViewerConfig::default(),
            speech: SpeechConfig::default(),
        })
    }
}

/// Writes a starter config with every field at its default
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        backend: BackendConfig::default(),
        describe: DescribeConfig::default(),
        viewer: ViewerConfig::default(),
        speech: SpeechConfig::default(),
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.describe.api_key, None);
        assert_eq!(config.viewer.target_size, DEFAULT_TARGET_SIZE);
        assert!(config.speech.enabled);
        assert_eq!(config.speech.command, "espeak");
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            base_url = "http://scanner.local:9000"

            [describe]
            api_key = "key-1"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "http://scanner.local:9000");
        assert_eq!(config.describe.api_key.as_deref(), Some("key-1"));
        assert_eq!(config.viewer.cache_dir, "./cache");
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gyrus.toml");
        save_default_config(&path).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.backend.base_url, default_base_url());
        assert_eq!(config.describe.endpoint, DEFAULT_DESCRIBE_ENDPOINT);
    }
}
