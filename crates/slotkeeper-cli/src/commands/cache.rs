//! Save, load, list and rotate cache blobs

use super::seat;
use crate::console::CliConsole;
use colored::*;
use slotkeeper_core::lifecycle::format_size;
use slotkeeper_core::{CacheBlobName, ParticipantId, SlotManager, SlotkeeperError, SlotkeeperResult};

pub async fn list(manager: &SlotManager, console: CliConsole, chat: Option<&str>) -> SlotkeeperResult<()> {
    console.print_header("Saved caches");
    let groups = manager.lifecycle().list_saves().await?;
    let mut shown = 0;

    for group in groups.iter().filter(|g| chat.is_none_or(|c| g.chat_id == c)) {
        println!(
            "{} {} {}",
            group.chat_id.cyan().bold(),
            "/".dimmed(),
            group.participant.magenta()
        );
        for (blob, size) in &group.saves {
            let tag = blob
                .tag()
                .map(|t| format!(" [{}]", t).yellow().to_string())
                .unwrap_or_default();
            println!(
                "    {}  {:>10}{}",
                blob.timestamp().format("%Y-%m-%d %H:%M:%S"),
                format_size(*size),
                tag
            );
            console.detail(&blob.encode());
        }
        shown += 1;
    }

    if shown == 0 {
        console.warn("No saved caches found");
    }
    Ok(())
}

pub async fn save(
    manager: &SlotManager,
    console: CliConsole,
    chat: &str,
    participant: &str,
    slot: usize,
    tag: Option<&str>,
) -> SlotkeeperResult<()> {
    let participant = ParticipantId::new(participant);
    seat(manager, &participant, slot)?;
    let saved = manager
        .lifecycle()
        .save_character_cache(chat, &participant, slot, tag)
        .await?;
    console.detail(&format!("Wrote {}", saved.blob));
    if let Some(rotation) = saved.rotation.filter(|r| !r.is_noop()) {
        console.detail(&format!("Rotated out {} old saves", rotation.deleted.len()));
    }
    Ok(())
}

pub async fn load(
    manager: &SlotManager,
    console: CliConsole,
    chat: &str,
    participant: &str,
    slot: usize,
    file: Option<&str>,
) -> SlotkeeperResult<()> {
    let participant = ParticipantId::new(participant);
    let blob = match file {
        Some(name) => CacheBlobName::decode(name).ok_or_else(|| {
            SlotkeeperError::invalid_input_field(format!("'{}' is not a cache file name", name), "file")
        })?,
        None => manager
            .lifecycle()
            .latest_blob(chat, &participant)
            .await?
            .ok_or_else(|| {
                SlotkeeperError::not_found_resource(
                    format!("no saved cache for {} in {}", participant, chat),
                    "Cache file",
                )
            })?,
    };

    seat(manager, &participant, slot)?;
    let transfer = manager.lifecycle().load(slot, &blob, &participant).await?;
    console.detail(&format!("Restored {} ({:?} tokens)", blob, transfer.tokens));
    Ok(())
}

pub async fn rotate(
    manager: &SlotManager,
    console: CliConsole,
    chat: &str,
    participant: &str,
) -> SlotkeeperResult<()> {
    let participant = ParticipantId::new(participant);
    let report = manager.lifecycle().rotate(chat, &participant).await?;

    for name in &report.deleted {
        console.detail(&format!("deleted {}", name));
    }
    for (name, error) in &report.failed {
        console.error(&format!("{}: {}", name, error));
    }
    if report.is_noop() {
        console.info(&format!("Nothing to rotate, {} saves kept", report.kept));
    } else {
        console.success(&format!(
            "Deleted {} old saves, kept {}",
            report.deleted.len(),
            report.kept
        ));
    }
    Ok(())
}
