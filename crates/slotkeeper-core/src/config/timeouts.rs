//! Centralized timeout configuration
//!
//! Default budgets for backend operations. All of them can be overridden via
//! `backend.timeouts` in the config file.

use std::time::Duration;

/// Default timeout values for slot operations on the inference server
pub mod slots {
    use super::*;

    /// Save a slot's cache to disk (5 minutes)
    pub const SAVE_SECS: u64 = 300;

    /// Restore a slot's cache from disk (5 minutes)
    pub const RESTORE_SECS: u64 = 300;

    /// Erase a slot's cache (30 seconds)
    pub const ERASE_SECS: u64 = 30;

    /// Poll slot occupancy (5 seconds)
    pub const INFO_SECS: u64 = 5;

    pub fn save_timeout() -> Duration {
        Duration::from_secs(SAVE_SECS)
    }

    pub fn restore_timeout() -> Duration {
        Duration::from_secs(RESTORE_SECS)
    }

    pub fn erase_timeout() -> Duration {
        Duration::from_secs(ERASE_SECS)
    }

    pub fn info_timeout() -> Duration {
        Duration::from_secs(INFO_SECS)
    }
}

/// Default timeout values for network plumbing
pub mod network {
    use super::*;

    /// Connection establishment (10 seconds)
    pub const CONNECT_SECS: u64 = 10;

    /// Blob store list/delete and token fetch (30 seconds)
    pub const FILES_REQUEST_SECS: u64 = 30;

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_SECS)
    }

    pub fn files_request_timeout() -> Duration {
        Duration::from_secs(FILES_REQUEST_SECS)
    }
}

/// Default timeout values for preload and heartbeat generations
pub mod generation {
    use super::*;

    /// Per-participant preload budget in minutes
    pub const PRELOAD_MINUTES: u64 = 5;

    /// Heartbeat request budget (60 seconds)
    pub const HEARTBEAT_SECS: u64 = 60;

    pub fn preload_timeout() -> Duration {
        Duration::from_secs(PRELOAD_MINUTES * 60)
    }

    pub fn heartbeat_timeout() -> Duration {
        Duration::from_secs(HEARTBEAT_SECS)
    }
}
