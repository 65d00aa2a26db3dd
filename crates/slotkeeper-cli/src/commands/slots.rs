//! Slot inspection and clearing

use crate::console::CliConsole;
use colored::*;
use slotkeeper_core::{SlotManager, SlotkeeperResult};

pub async fn show(manager: &SlotManager, console: CliConsole) -> SlotkeeperResult<()> {
    console.print_header("Slots");
    let slots = manager.lifecycle().backend().slots().await?;
    for slot in &slots {
        let state = if slot.is_processing {
            "processing".yellow()
        } else {
            "idle".green()
        };
        println!("  {:>3}  {}", slot.id, state);
    }
    console.info(&format!("{} slots", slots.len()));
    Ok(())
}

pub async fn clear(manager: &SlotManager, console: CliConsole, slot: usize) -> SlotkeeperResult<()> {
    manager.lifecycle().clear(slot).await?;
    console.success(&format!("Cleared slot {}", slot));
    Ok(())
}

pub async fn clear_all(manager: &SlotManager, console: CliConsole) -> SlotkeeperResult<()> {
    let summary = manager.clear_all_slots().await?;
    for (slot, error) in &summary.failed {
        console.error(&format!("Slot {}: {}", slot, error));
    }
    console.detail(&format!("Cleared: {:?}", summary.cleared));
    Ok(())
}
