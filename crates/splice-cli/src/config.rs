//! Application configuration.

use serde::{Deserialize, Serialize};
use splice_core::{RationalTime, SnapPolicy};
use splice_timeline::{EditLimits, ExportSettings, SplitFadePolicy};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,

    /// Settings given to new projects.
    pub export: ExportSettings,

    pub editing: EditingConfig,

    pub backend: BackendConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "splice_render=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

/// Editing tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    /// Snap distance in seconds.
    pub snap_threshold: f64,
    pub snap_policy: SnapPolicy,
    pub split_fades: SplitFadePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// ffmpeg binary; searched on PATH when unset.
    pub ffmpeg: Option<PathBuf>,

    /// Font file for text overlays. Without one, overlays are skipped.
    pub font: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        let limits = EditLimits::default();
        Self {
            snap_threshold: limits.snap_threshold.to_seconds_f64(),
            snap_policy: limits.snap_policy,
            split_fades: limits.split_fades,
        }
    }
}

impl EditingConfig {
    pub fn limits(&self) -> EditLimits {
        EditLimits {
            snap_threshold: RationalTime::from_seconds_f64(self.snap_threshold).non_negative(),
            snap_policy: self.snap_policy,
            split_fades: self.split_fades,
            ..EditLimits::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl AppConfig {
    /// Load the config file at `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("splice")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_timeline::{Quality, Resolution};

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"export": {"resolution": "720p", "quality": "high"}, "editing": {"snap_policy": "first-match"}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.export.resolution, Resolution::Hd720);
        assert_eq!(config.export.quality, Quality::High);
        assert_eq!(config.editing.snap_policy, SnapPolicy::FirstMatch);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.editing.limits().snap_threshold, RationalTime::new(1, 2));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.backend.font = Some(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf"));
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }
}
