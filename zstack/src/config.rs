use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::stacking::{ScaleModel, DEFAULT_UNMASK_HALF_WIDTH};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
}

/// Run configuration, read from YAML. Command-line flags override it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database: PathBuf,
    pub cutout_path: PathBuf,
    pub stack_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_baseline_days")]
    pub baseline_days: f64,
    #[serde(default = "default_scales")]
    pub scales: Vec<ScaleModel>,
    #[serde(default = "default_mask_plane")]
    pub mask_plane: String,
    #[serde(default = "default_alignment_plane")]
    pub alignment_plane: String,
    #[serde(default = "default_unmask_half_width")]
    pub unmask_half_width: usize,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_baseline_days() -> f64 {
    14.0
}

fn default_scales() -> Vec<ScaleModel> {
    vec![ScaleModel::Coma, ScaleModel::Surface]
}

fn default_mask_plane() -> String {
    "MASK".to_string()
}

fn default_alignment_plane() -> String {
    "SANGLE".to_string()
}

fn default_unmask_half_width() -> usize {
    DEFAULT_UNMASK_HALF_WIDTH
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(text)
    }
}
