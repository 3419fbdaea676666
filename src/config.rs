use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "PHOTOINDEX_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite catalog location.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root of the sharded thumbnail tree.
    #[serde(default = "default_thumbnails_path")]
    pub thumbnails_path: PathBuf,

    /// Root folders to scan, in order.
    #[serde(default)]
    pub folders: Vec<PathBuf>,

    /// Long side of generated thumbnails, in pixels.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// JPEG encode quality (0-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("thumbnail_size must be greater than zero")]
    ZeroThumbnailSize,
    #[error("jpeg_quality must be between 0 and 100, got {0}")]
    QualityOutOfRange(u8),
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photoindex")
}

fn default_db_path() -> PathBuf {
    data_root().join("photo-database.db")
}

fn default_thumbnails_path() -> PathBuf {
    data_root().join("thumbnails")
}

fn default_thumbnail_size() -> u32 {
    600
}

fn default_jpeg_quality() -> u8 {
    75
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            thumbnails_path: default_thumbnails_path(),
            folders: Vec::new(),
            thumbnail_size: default_thumbnail_size(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Config {
    /// Load from the default location (or `PHOTOINDEX_CONFIG`).
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_size == 0 {
            return Err(ConfigError::ZeroThumbnailSize);
        }
        if self.jpeg_quality > 100 {
            return Err(ConfigError::QualityOutOfRange(self.jpeg_quality));
        }
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photoindex")
    }
}
