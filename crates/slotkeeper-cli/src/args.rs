//! CLI argument definitions using clap
//!
//! - slotkeeper slots                         # Slot report from the server
//! - slotkeeper saves [--chat ID]             # Saved caches, grouped
//! - slotkeeper save/load/clear/rotate ...    # Single-slot operations
//! - slotkeeper preload --chat ID [NAMES]     # Warm caches in batch
//! - slotkeeper heartbeat                     # Keep the model loaded
//! - slotkeeper config init|show|validate     # Configuration

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "slotkeeper")]
#[command(about = "Slotkeeper - KV cache slot manager for llama.cpp servers")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (defaults to ./slotkeeper.toml)
    #[arg(long, global = true)]
    pub config_file: Option<String>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the server's slots and whether they are processing
    Slots,

    /// List saved caches grouped by chat and participant
    Saves {
        /// Only show this chat
        #[arg(long)]
        chat: Option<String>,
    },

    /// Save a slot's cache for a participant
    Save {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        participant: String,
        #[arg(long)]
        slot: usize,
        /// Tagged saves are kept out of rotation
        #[arg(long)]
        tag: Option<String>,
    },

    /// Restore a saved cache into a slot
    Load {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        participant: String,
        #[arg(long)]
        slot: usize,
        /// Exact blob to load; the newest one for the pair otherwise
        #[arg(long)]
        file: Option<String>,
    },

    /// Erase one slot
    Clear {
        #[arg(long)]
        slot: usize,
    },

    /// Erase every slot on the server
    ClearAll,

    /// Delete old autosaves for a participant beyond the retention count
    Rotate {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        participant: String,
    },

    /// Warm caches for participants one after another (Ctrl+C cancels)
    Preload {
        #[arg(long)]
        chat: String,
        /// Participants to preload; pick interactively when omitted
        participants: Vec<String>,
    },

    /// Send keepalive generations until Ctrl+C
    Heartbeat {
        /// Seconds between heartbeats, overriding the configuration
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Manage configuration files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a configuration file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
