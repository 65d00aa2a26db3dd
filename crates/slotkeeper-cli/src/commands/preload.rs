//! Batch preload with interactive selection

use crate::console::CliConsole;
use crate::progress::PreloadProgress;
use crate::signal_handler::InterruptGuard;
use dialoguer::{MultiSelect, theme::ColorfulTheme};
use slotkeeper_core::{ParticipantId, SlotManager, SlotkeeperError, SlotkeeperResult};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

pub async fn run(
    manager: &SlotManager,
    console: CliConsole,
    chat: &str,
    participants: Vec<String>,
) -> SlotkeeperResult<()> {
    let participants = if participants.is_empty() {
        choose_participants(manager, chat).await?
    } else {
        participants.into_iter().map(ParticipantId::from).collect()
    };
    if participants.is_empty() {
        console.warn("Nothing selected");
        return Ok(());
    }

    manager.on_chat_changed(Some(chat), &[]).await;

    let cancel = CancellationToken::new();
    let _guard = InterruptGuard::install(cancel.clone())?;
    let progress = PreloadProgress::new(participants.len());
    let job = manager.preload(participants, cancel, &progress).await;
    progress.finish();
    let job = job?;

    console.print_header("Preload");
    console.info(&format!(
        "{} preloaded, {} failed{}",
        job.preloaded.len(),
        job.errors.len(),
        if job.cancelled { ", cancelled" } else { "" }
    ));
    for (participant, error) in &job.errors {
        console.error(&format!("{}: {}", participant, error.user_message()));
    }
    if job.remaining() > 0 {
        console.detail(&format!("{} participants not processed", job.remaining()));
    }
    Ok(())
}

/// Offer every participant with a saved cache in `chat`
async fn choose_participants(manager: &SlotManager, chat: &str) -> SlotkeeperResult<Vec<ParticipantId>> {
    let names: Vec<String> = manager
        .lifecycle()
        .list_saves()
        .await?
        .into_iter()
        .filter(|group| group.chat_id == chat)
        .map(|group| group.participant)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if names.is_empty() {
        return Err(SlotkeeperError::invalid_input_field(
            format!("no participants given and none have saves in '{}'", chat),
            "participants",
        ));
    }

    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Participants to preload (space to toggle)")
        .items(&names)
        .interact()
        .map_err(|e| SlotkeeperError::io(format!("Selection failed: {}", e)))?;

    Ok(picked
        .into_iter()
        .map(|index| ParticipantId::new(&names[index]))
        .collect())
}
