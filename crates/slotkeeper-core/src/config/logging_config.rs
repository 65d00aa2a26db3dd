//! Logging configuration

use crate::error::{SlotkeeperError, SlotkeeperResult};
use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    pub fn validate(&self) -> SlotkeeperResult<()> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(SlotkeeperError::invalid_input_field(
                    format!("unknown log level '{}'", other),
                    "logging.level",
                ));
            }
        }
        match self.format.to_ascii_lowercase().as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(SlotkeeperError::invalid_input_field(
                format!("unknown log format '{}'", other),
                "logging.format",
            )),
        }
    }
}
