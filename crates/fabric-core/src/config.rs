//! Loading physics and growth settings from data files.
//!
//! Feature-gated behind `data-loader`. Files are RON, TOML or JSON, chosen
//! by extension. Every field is optional; anything left out keeps its
//! default.

use crate::physics::values::PhysicsConfig;
use crate::transforms::GrowthConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },
    #[error("{format:?} parse error: {detail}")]
    Parse { format: Format, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything a simulation run can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicsConfig,
    pub growth: GrowthConfig,
}

/// Deserialize `content` in the given format.
pub fn parse<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, ConfigError> {
    let parse_error = |detail: String| ConfigError::Parse { format, detail };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read and deserialize a file, detecting the format from its extension.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let value = parse(&content, format)?;
    tracing::info!(file = %path.display(), ?format, "configuration loaded");
    Ok(value)
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    load(path)
}

pub fn load_physics(path: &Path) -> Result<PhysicsConfig, ConfigError> {
    load(path)
}

pub fn load_growth(path: &Path) -> Result<GrowthConfig, ConfigError> {
    load(path)
}
