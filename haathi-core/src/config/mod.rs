//! Host configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub canvas: CanvasConfig,
    pub assets: AssetsConfig,
    pub storage: StorageConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

/// Drawing surface settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// TTF/OTF used for text. Without one, text draws are skipped.
    pub font: Option<PathBuf>,
    /// Colour the surface is cleared to before the guest starts.
    pub background: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            font: None,
            background: String::from("#000000"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Image and sound paths are resolved relative to this directory.
    pub root: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database directory for the file backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("haathi-save"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Frames per second; also sets how much audio is mixed per frame.
    pub fps: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            fps: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive. `RUST_LOG` takes precedence when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: String::from("info"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl HostConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "canvas size {}x{} must be non-zero",
                self.canvas.width, self.canvas.height
            )));
        }
        if self.audio.sample_rate == 0 || self.audio.fps == 0 {
            return Err(ConfigError::Invalid(
                "audio sample_rate and fps must be non-zero".into(),
            ));
        }
        Ok(self)
    }
}

impl std::str::FromStr for HostConfig {
    type Err = ConfigError;

    /// Parse configuration from a TOML string.
    fn from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str::<HostConfig>(content)?.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: HostConfig = "".parse().unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.canvas.width, 1280);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.audio.sample_rate, 44_100);
    }

    #[test]
    fn test_parse_config() {
        let toml = r##"
[canvas]
width = 320
height = 240
font = "assets/font.ttf"
background = "#102030"

[assets]
root = "game"

[storage]
backend = "memory"

[audio]
fps = 30

[logging]
filter = "haathi_core=debug"
"##;
        let config: HostConfig = toml.parse().unwrap();
        assert_eq!((config.canvas.width, config.canvas.height), (320, 240));
        assert_eq!(config.canvas.font, Some(PathBuf::from("assets/font.ttf")));
        assert_eq!(config.canvas.background, "#102030");
        assert_eq!(config.assets.root, PathBuf::from("game"));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.path, PathBuf::from("haathi-save"));
        assert_eq!(config.audio.fps, 30);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.logging.filter, "haathi_core=debug");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = "[canvas]\nwidht = 3\n".parse::<HostConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_sizes_are_invalid() {
        let err = "[canvas]\nwidth = 0\n".parse::<HostConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = "[audio]\nfps = 0\n".parse::<HostConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
