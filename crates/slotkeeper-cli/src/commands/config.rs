//! Configuration management commands

use crate::console::CliConsole;
use colored::*;
use slotkeeper_core::config::file_loader::{load_from_file, save_to_file};
use slotkeeper_core::{ConfigLoader, SlotkeeperConfig, SlotkeeperError, SlotkeeperResult};
use std::path::Path;

/// Show the effective configuration (file plus environment)
pub async fn show(config_file: &Path, console: CliConsole) -> SlotkeeperResult<()> {
    console.print_header("Configuration");

    if config_file.exists() {
        console.success(&format!("Loaded configuration from: {}", config_file.display()));
    } else {
        console.warn(&format!("Configuration file not found: {}", config_file.display()));
        console.info("Using default configuration");
    }

    let config = ConfigLoader::new()
        .with_defaults()
        .with_file(config_file)
        .with_env()
        .load()?;
    print_config(&config);
    Ok(())
}

/// Validate the configuration file on its own
pub async fn validate(config_file: &Path, console: CliConsole) -> SlotkeeperResult<()> {
    console.print_header("Configuration Validation");

    if !config_file.exists() {
        return Err(SlotkeeperError::config(format!(
            "Configuration file not found: {}",
            config_file.display()
        )));
    }

    let config = load_from_file(config_file).inspect_err(|e| {
        console.error(&format!("Failed to load configuration: {}", e));
    })?;
    config.validate().inspect_err(|e| {
        console.error(&format!("Configuration validation failed: {}", e));
    })?;

    console.success("Configuration is valid");
    console.detail(&format!("Slots server: {}", config.backend.slots_url));
    console.detail(&format!("Files server: {}", config.backend.files_url));
    Ok(())
}

/// Write a configuration file holding the defaults
pub async fn init(config_file: &Path, force: bool, console: CliConsole) -> SlotkeeperResult<()> {
    console.print_header("Configuration Initialization");

    if config_file.exists() && !force {
        console.error(&format!(
            "Configuration file already exists: {}",
            config_file.display()
        ));
        console.info("Use --force to overwrite");
        return Err(SlotkeeperError::config("Configuration file already exists"));
    }

    save_to_file(&SlotkeeperConfig::default(), config_file)?;
    console.success(&format!("Created configuration file: {}", config_file.display()));
    console.info("Edit backend.slots_url and backend.files_url to point at your servers");
    Ok(())
}

fn print_config(config: &SlotkeeperConfig) {
    let row = |key: &str, value: String| println!("  {:<28} {}", key.cyan(), value);

    row("enabled", config.enabled.to_string());
    row("save_interval", config.save_interval.to_string());
    row("max_files", config.max_files.to_string());
    row("clear_on_chat_change", config.clear_on_chat_change.to_string());
    row("preload_timeout", format!("{} min", config.preload_timeout));
    row(
        "heartbeat",
        match config.heartbeat {
            0 => "disabled".to_string(),
            seconds => format!("{}s", seconds),
        },
    );
    row("show_notifications", config.show_notifications.to_string());
    row("min_usage_for_save", config.min_usage_for_save.to_string());
    row(
        "min_usage_for_eviction_save",
        config.min_usage_for_eviction_save.to_string(),
    );
    row("min_blob_size_bytes", config.min_blob_size_bytes.to_string());
    row("settle_delay", format!("{:?}", config.settle_delay));
    row("backend.slots_url", config.backend.slots_url.clone());
    row("backend.files_url", config.backend.files_url.clone());
    row(
        "backend.timeouts",
        format!(
            "save {}s, restore {}s, erase {}s, slot_info {}s",
            config.backend.timeouts.save,
            config.backend.timeouts.restore,
            config.backend.timeouts.erase,
            config.backend.timeouts.slot_info
        ),
    );
    row(
        "logging",
        format!("{} / {}", config.logging.level, config.logging.format),
    );
}
