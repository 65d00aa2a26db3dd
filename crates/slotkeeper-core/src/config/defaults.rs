//! Default values for configuration fields

/// Messages generated before an autosave fires
pub const SAVE_INTERVAL: u32 = 5;

/// Untagged blobs kept per (chat, participant)
pub const MAX_FILES: usize = 10;

/// Minimum usage for a slot to be flushed on chat change
pub const MIN_USAGE_FOR_SAVE: u32 = 2;

/// Minimum usage for an evicted occupant to be saved first
pub const MIN_USAGE_FOR_EVICTION_SAVE: u32 = 1;

/// Saved blobs smaller than this are treated as corrupt (1 MiB)
pub const MIN_BLOB_SIZE_BYTES: u64 = 1024 * 1024;

/// Delay between a backend save and the blob size check
pub const SETTLE_DELAY_MS: u64 = 1000;

/// Pool size used when the backend cannot report its slots
pub const FALLBACK_SLOT_COUNT: usize = 4;

pub const SLOTS_URL: &str = "http://127.0.0.1:8080";
pub const FILES_URL: &str = "http://127.0.0.1:8000/api";

/// `{{participant}}` is replaced with the participant name
pub const PRELOAD_PROMPT: &str = "{{participant}}:";
pub const HEARTBEAT_PROMPT: &str = " ";
pub const PRELOAD_MAX_TOKENS: u32 = 1;

/// Config file looked up in the working directory
pub const CONFIG_FILE: &str = "slotkeeper.toml";
