//! Command routing logic for CLI

use crate::args::{Cli, Commands, ConfigAction};
use crate::commands;
use crate::console::CliConsole;
use slotkeeper_core::SlotkeeperResult;
use slotkeeper_core::config::{ConfigLoader, resolve_config_path};

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> SlotkeeperResult<()> {
    let console = CliConsole::new(cli.verbose);
    let config_path = resolve_config_path(cli.config_file.as_deref());

    // Config commands work on the file itself and never contact the servers.
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config::show(&config_path, console).await,
            ConfigAction::Validate => commands::config::validate(&config_path, console).await,
            ConfigAction::Init { force } => {
                commands::config::init(&config_path, *force, console).await
            }
        };
    }

    let mut config = ConfigLoader::new()
        .with_defaults()
        .with_file(&config_path)
        .with_env()
        .load()?;
    if let Commands::Heartbeat {
        interval: Some(seconds),
    } = &cli.command
    {
        config.heartbeat = *seconds;
    }

    let manager = commands::connect(config, console).await?;
    match cli.command {
        Commands::Slots => commands::slots::show(&manager, console).await,
        Commands::Saves { chat } => commands::cache::list(&manager, console, chat.as_deref()).await,
        Commands::Save {
            chat,
            participant,
            slot,
            tag,
        } => commands::cache::save(&manager, console, &chat, &participant, slot, tag.as_deref()).await,
        Commands::Load {
            chat,
            participant,
            slot,
            file,
        } => commands::cache::load(&manager, console, &chat, &participant, slot, file.as_deref()).await,
        Commands::Clear { slot } => commands::slots::clear(&manager, console, slot).await,
        Commands::ClearAll => commands::slots::clear_all(&manager, console).await,
        Commands::Rotate { chat, participant } => {
            commands::cache::rotate(&manager, console, &chat, &participant).await
        }
        Commands::Preload { chat, participants } => {
            commands::preload::run(&manager, console, &chat, participants).await
        }
        Commands::Heartbeat { .. } => commands::heartbeat::run(&manager, console).await,
        Commands::Config { .. } => Ok(()),
    }
}
