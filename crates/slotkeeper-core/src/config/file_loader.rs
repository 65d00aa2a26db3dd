//! File-based configuration loading and saving

use super::model::SlotkeeperConfig;
use crate::error::{SlotkeeperError, SlotkeeperResult};
use std::fs;
use std::path::Path;

/// Load configuration from a file
///
/// Supports JSON, TOML, and YAML formats based on file extension.
/// Returns default config if file doesn't exist.
pub fn load_from_file(path: &Path) -> SlotkeeperResult<SlotkeeperConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file missing, using defaults");
        return Ok(SlotkeeperConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        SlotkeeperError::config_with_context(
            format!("Failed to read config file: {}", e),
            format!("Reading configuration from '{}'", path.display()),
        )
    })?;

    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            SlotkeeperError::config_with_context(
                format!("Failed to parse TOML config: {}", e),
                format!("Deserializing TOML configuration from '{}'", path.display()),
            )
        })?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
            SlotkeeperError::config_with_context(
                format!("Failed to parse YAML config: {}", e),
                format!("Deserializing YAML configuration from '{}'", path.display()),
            )
        })?,
        _ => serde_json::from_str(&content).map_err(|e| {
            SlotkeeperError::config_with_context(
                format!("Failed to parse JSON config: {}", e),
                format!("Deserializing JSON configuration from '{}'", path.display()),
            )
        })?,
    };

    Ok(config)
}

/// Write configuration to a file, format chosen by extension
pub fn save_to_file(config: &SlotkeeperConfig, path: &Path) -> SlotkeeperResult<()> {
    let content = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::to_string_pretty(config)
            .map_err(|e| SlotkeeperError::config(format!("Failed to serialize TOML: {}", e)))?,
        Some("yaml") | Some("yml") => serde_yaml::to_string(config)
            .map_err(|e| SlotkeeperError::config(format!("Failed to serialize YAML: {}", e)))?,
        _ => serde_json::to_string_pretty(config)?,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| SlotkeeperError::io_with_path(e.to_string(), parent.display().to_string()))?;
    }
    fs::write(path, content)
        .map_err(|e| SlotkeeperError::io_with_path(e.to_string(), path.display().to_string()))
}
