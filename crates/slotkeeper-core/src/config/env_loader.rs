//! Environment variable-based configuration overrides
//!
//! Variables use the `SLOTKEEPER_` prefix. Only variables that are present
//! override the current value.

use super::model::SlotkeeperConfig;
use crate::error::{SlotkeeperError, SlotkeeperResult};
use std::env;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "SLOTKEEPER_";

/// Apply overrides from the process environment
pub fn apply_env_overrides(config: &mut SlotkeeperConfig) -> SlotkeeperResult<()> {
    apply_overrides(config, |key| env::var(key).ok())
}

/// Apply overrides from an arbitrary lookup (used by tests)
pub fn apply_overrides<F>(config: &mut SlotkeeperConfig, lookup: F) -> SlotkeeperResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

    if let Some(v) = get("ENABLED") {
        config.enabled = parse_bool("ENABLED", &v)?;
    }
    if let Some(v) = get("SAVE_INTERVAL") {
        config.save_interval = parse_num("SAVE_INTERVAL", &v)?;
    }
    if let Some(v) = get("MAX_FILES") {
        config.max_files = parse_num("MAX_FILES", &v)?;
    }
    if let Some(v) = get("CLEAR_ON_CHAT_CHANGE") {
        config.clear_on_chat_change = parse_bool("CLEAR_ON_CHAT_CHANGE", &v)?;
    }
    if let Some(v) = get("PRELOAD_TIMEOUT") {
        config.preload_timeout = parse_num("PRELOAD_TIMEOUT", &v)?;
    }
    if let Some(v) = get("HEARTBEAT") {
        config.heartbeat = parse_num("HEARTBEAT", &v)?;
    }
    if let Some(v) = get("SHOW_NOTIFICATIONS") {
        config.show_notifications = parse_bool("SHOW_NOTIFICATIONS", &v)?;
    }
    if let Some(v) = get("SLOTS_URL") {
        config.backend.slots_url = v;
    }
    if let Some(v) = get("FILES_URL") {
        config.backend.files_url = v;
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.logging.level = v;
    }

    Ok(())
}

fn parse_num<T: FromStr>(name: &str, value: &str) -> SlotkeeperResult<T> {
    value.trim().parse().map_err(|_| {
        SlotkeeperError::config(format!(
            "Invalid {}{} value '{}': expected a non-negative integer",
            ENV_PREFIX, name, value
        ))
    })
}

fn parse_bool(name: &str, value: &str) -> SlotkeeperResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SlotkeeperError::config(format!(
            "Invalid {}{} value '{}': expected true or false",
            ENV_PREFIX, name, value
        ))),
    }
}
