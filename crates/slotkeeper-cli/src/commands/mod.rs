//! CLI command implementations

pub mod cache;
pub mod config;
pub mod heartbeat;
pub mod preload;
pub mod slots;

use crate::console::{CliConsole, ConsoleNotifier};
use slotkeeper_core::pool::AcquirePlan;
use slotkeeper_core::{ParticipantId, SlotManager, SlotkeeperConfig, SlotkeeperError, SlotkeeperResult};
use std::sync::Arc;

/// Connect to the configured servers and size the pool
pub async fn connect(config: SlotkeeperConfig, console: CliConsole) -> SlotkeeperResult<SlotManager> {
    let manager = SlotManager::connect(config, Arc::new(ConsoleNotifier::new(console)))?;
    let slots = manager.initialize().await;
    console.detail(&format!("Pool sized to {} slots", slots));
    Ok(manager)
}

/// Seat `participant` in `slot` of a fresh pool so lifecycle updates apply to it
pub(crate) fn seat(manager: &SlotManager, participant: &ParticipantId, slot: usize) -> SlotkeeperResult<()> {
    let mut pool = manager.pool().lock();
    if slot >= pool.len() {
        return Err(SlotkeeperError::invalid_input_field(
            format!("slot {} does not exist (server has {})", slot, pool.len()),
            "slot",
        ));
    }
    if pool.occupy(&AcquirePlan::Free(slot), participant) {
        Ok(())
    } else {
        Err(SlotkeeperError::invalid_input_field(
            format!("slot {} is already taken", slot),
            "slot",
        ))
    }
}
