use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "shelfcheck";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Detection model location and inference parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    /// One class name per line; line index is the class id
    pub labels_path: PathBuf,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub database_path: PathBuf,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for ModelConfig {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            model_path: dir.join("model.rten"),
            labels_path: dir.join("labels.txt"),
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: data_dir().join("catalog.db"),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one, the per-user
    /// config file is used when present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_file_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        check_unit_interval("model.confidence_threshold", self.model.confidence_threshold)?;
        check_unit_interval("model.iou_threshold", self.model.iou_threshold)?;
        if self.model.input_size == 0 {
            anyhow::bail!("model.input_size must be positive");
        }
        Ok(())
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push(APP_DIR);
            path.push("config.toml");
            path
        })
    }
}

/// Check a threshold lies in [0, 1]
pub fn check_unit_interval(name: &str, value: f32) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} must be within [0, 1], got {}", name, value);
    }
    Ok(())
}
