//! Layered configuration loader

use super::defaults;
use super::env_loader;
use super::file_loader;
use super::model::SlotkeeperConfig;
use crate::error::SlotkeeperResult;
use std::path::{Path, PathBuf};

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Configuration from a file (replaces everything loaded so far)
    File(PathBuf),
    /// `SLOTKEEPER_*` overrides on top of what is loaded so far
    Environment,
    /// Built-in defaults
    Default,
}

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    pub fn with_env(self) -> Self {
        self.add_source(ConfigSource::Environment)
    }

    pub fn with_defaults(self) -> Self {
        self.add_source(ConfigSource::Default)
    }

    /// Load configuration from all sources, in order, then validate
    pub fn load(self) -> SlotkeeperResult<SlotkeeperConfig> {
        let mut config = SlotkeeperConfig::default();

        for source in &self.sources {
            match source {
                ConfigSource::File(path) => {
                    tracing::debug!(path = %path.display(), "loading config file");
                    config = file_loader::load_from_file(path)?;
                }
                ConfigSource::Environment => {
                    tracing::debug!("applying environment overrides");
                    env_loader::apply_env_overrides(&mut config)?;
                }
                ConfigSource::Default => {
                    config = SlotkeeperConfig::default();
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the config path the CLI should use.
///
/// An explicit path is tilde-expanded. Without one, `slotkeeper.toml` in the
/// working directory wins, then `<config dir>/slotkeeper/config.toml`.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(raw) = explicit {
        return PathBuf::from(shellexpand::tilde(raw).into_owned());
    }

    let local = PathBuf::from(defaults::CONFIG_FILE);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|dir| dir.join("slotkeeper").join("config.toml"))
        .filter(|p| p.exists())
        .unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_source_then_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("slotkeeper.toml");
        fs::write(&path, "max_files = 0\n").unwrap();

        let result = ConfigLoader::new().with_defaults().with_file(&path).load();
        assert!(result.is_err());
    }

    #[test]
    fn test_loader_defaults_only() {
        let config = ConfigLoader::default().with_defaults().load().unwrap();
        assert_eq!(config, SlotkeeperConfig::default());
    }

    #[test]
    fn test_explicit_path_is_tilde_expanded() {
        let resolved = resolve_config_path(Some("~/slotkeeper.toml"));
        assert!(resolved.ends_with("slotkeeper.toml"));
        if let Some(home) = dirs::home_dir() {
            assert!(resolved.starts_with(home));
        }
    }
}
