//! TOML configuration for the `spendscan` binary.

use serde::{Deserialize, Serialize};
use spendscan_core::Category;
use spendscan_ocr::DEFAULT_MAX_WIDTH;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("could not determine a home directory for application data")]
    NoHomeDir,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the database lives. Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: None, database_file: "expenses.db".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code.
    pub language: String,
    pub tessdata_path: Option<String>,
    /// Images wider than this are scaled down before recognition.
    pub max_width: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { language: "eng".to_string(), tessdata_path: None, max_width: DEFAULT_MAX_WIDTH }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Category given to parsed items unless overridden.
    pub default_category: Category,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { default_category: Category::Other }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "spendscan", "spendscan")
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Io { path: parent.to_path_buf(), source })?;
        }
        fs::write(path, self.to_toml_string()?)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => project_dirs()
                .map(|d| d.data_dir().to_path_buf())
                .ok_or(ConfigError::NoHomeDir),
        }
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(&self.storage.database_file))
    }
}
