//! Configuration for Slotkeeper
//!
//! Sources are layered in order: built-in defaults, a config file
//! (TOML/YAML/JSON by extension), then `SLOTKEEPER_*` environment overrides.

pub mod defaults;
pub mod env_loader;
pub mod file_loader;
pub mod loader;
pub mod logging_config;
pub mod model;
pub mod timeouts;

pub use loader::{ConfigLoader, ConfigSource, resolve_config_path};
pub use logging_config::LoggingConfig;
pub use model::{BackendConfig, BackendTimeouts, GenerationConfig, SlotkeeperConfig};
