//! Slotkeeper CLI application
//!
//! Operator tool for a llama.cpp-style server with slot persistence enabled:
//! inspect slots, save and restore per-participant caches, rotate old saves,
//! preload participants in batch and keep the model loaded with heartbeats.
//!
//! ```bash
//! slotkeeper config init
//! slotkeeper preload --chat campfire Alice Bob
//! slotkeeper saves --chat campfire
//! ```

mod args;
mod commands;
mod console;
mod progress;
mod router;
mod signal_handler;

use clap::Parser;
use slotkeeper_core::config::{ConfigLoader, LoggingConfig, resolve_config_path};
use tracing_subscriber::EnvFilter;

use args::Cli;

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    // RUST_LOG wins; otherwise the configured level, or debug with --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { logging.level.as_str() };
        EnvFilter::new(format!("slotkeeper_core={level},slotkeeper={level},warn"))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.is_json() {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the same layered config the commands use;
    // a broken file still gets reported by the command itself.
    let logging = ConfigLoader::new()
        .with_defaults()
        .with_file(resolve_config_path(cli.config_file.as_deref()))
        .with_env()
        .load()
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&logging, cli.verbose);

    router::route(cli).await.map_err(|e| {
        tracing::debug!(code = e.error_code(), "command failed");
        anyhow::anyhow!(e.user_message())
    })
}
