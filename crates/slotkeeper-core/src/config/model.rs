//! Configuration data model

use super::defaults;
use super::logging_config::LoggingConfig;
use super::timeouts;
use crate::error::{SlotkeeperError, SlotkeeperResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level Slotkeeper configuration
///
/// All fields support serde(default) so partial configuration files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotkeeperConfig {
    /// Master switch; host events are ignored when false
    pub enabled: bool,
    /// Messages generated before an autosave
    pub save_interval: u32,
    /// Untagged blobs kept per (chat, participant)
    pub max_files: usize,
    /// Flush, clear and reassign the pool when the active chat changes
    pub clear_on_chat_change: bool,
    /// Per-participant preload budget, in minutes
    pub preload_timeout: u64,
    /// Seconds between heartbeats; 0 disables the heartbeat
    pub heartbeat: u64,
    /// Deliver info/success notices (warnings and errors are always delivered)
    pub show_notifications: bool,
    /// Usage needed for an occupant to be flushed on chat change
    pub min_usage_for_save: u32,
    /// Usage needed for an evicted occupant to be saved before eviction
    pub min_usage_for_eviction_save: u32,
    /// Saved blobs below this size are deleted and reported as invalid
    pub min_blob_size_bytes: u64,
    /// Wait between a backend save and the size check
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    /// Pool size when the backend cannot report its slot count
    pub fallback_slot_count: usize,
    pub backend: BackendConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

impl Default for SlotkeeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_interval: defaults::SAVE_INTERVAL,
            max_files: defaults::MAX_FILES,
            clear_on_chat_change: true,
            preload_timeout: timeouts::generation::PRELOAD_MINUTES,
            heartbeat: 0,
            show_notifications: true,
            min_usage_for_save: defaults::MIN_USAGE_FOR_SAVE,
            min_usage_for_eviction_save: defaults::MIN_USAGE_FOR_EVICTION_SAVE,
            min_blob_size_bytes: defaults::MIN_BLOB_SIZE_BYTES,
            settle_delay: Duration::from_millis(defaults::SETTLE_DELAY_MS),
            fallback_slot_count: defaults::FALLBACK_SLOT_COUNT,
            backend: BackendConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SlotkeeperConfig {
    /// Preload budget per participant
    pub fn preload_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.preload_timeout * 60)
    }

    /// Heartbeat period, `None` when disabled
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat > 0).then(|| Duration::from_secs(self.heartbeat))
    }

    /// Validate the configuration, collecting every problem into one error
    pub fn validate(&self) -> SlotkeeperResult<()> {
        let mut problems = Vec::new();

        if self.save_interval == 0 {
            problems.push("save_interval must be at least 1".to_string());
        }
        if self.max_files == 0 {
            problems.push("max_files must be at least 1".to_string());
        }
        if self.preload_timeout == 0 {
            problems.push("preload_timeout must be at least 1 minute".to_string());
        }
        if self.fallback_slot_count == 0 {
            problems.push("fallback_slot_count must be at least 1".to_string());
        }
        for (field, url) in [
            ("backend.slots_url", &self.backend.slots_url),
            ("backend.files_url", &self.backend.files_url),
        ] {
            if let Err(e) = reqwest::Url::parse(url) {
                problems.push(format!("{} '{}' is not a valid URL: {}", field, url, e));
            }
        }
        if self.backend.timeouts.save == 0 || self.backend.timeouts.restore == 0 {
            problems.push("backend save/restore timeouts must be positive".to_string());
        }
        if let Err(e) = self.logging.validate() {
            problems.push(e.to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SlotkeeperError::config_with_context(
                problems.join("; "),
                format!("{} configuration problem(s)", problems.len()),
            ))
        }
    }
}

/// Endpoints of the inference server and the file-management backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the inference server (`/slots`, `/completion`)
    pub slots_url: String,
    /// Base URL of the blob store (`/files`, `/csrf-token`)
    pub files_url: String,
    pub timeouts: BackendTimeouts,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            slots_url: defaults::SLOTS_URL.to_string(),
            files_url: defaults::FILES_URL.to_string(),
            timeouts: BackendTimeouts::default(),
        }
    }
}

/// Per-operation budgets in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendTimeouts {
    pub save: u64,
    pub restore: u64,
    pub erase: u64,
    pub slot_info: u64,
    pub connect: u64,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            save: timeouts::slots::SAVE_SECS,
            restore: timeouts::slots::RESTORE_SECS,
            erase: timeouts::slots::ERASE_SECS,
            slot_info: timeouts::slots::INFO_SECS,
            connect: timeouts::network::CONNECT_SECS,
        }
    }
}

/// Prompts used for generations the manager issues itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub preload_prompt: String,
    pub heartbeat_prompt: String,
    pub preload_max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            preload_prompt: defaults::PRELOAD_PROMPT.to_string(),
            heartbeat_prompt: defaults::HEARTBEAT_PROMPT.to_string(),
            preload_max_tokens: defaults::PRELOAD_MAX_TOKENS,
        }
    }
}

impl GenerationConfig {
    /// Render the preload prompt for one participant
    pub fn render_preload_prompt(&self, participant: &str) -> String {
        self.preload_prompt.replace("{{participant}}", participant)
    }
}
