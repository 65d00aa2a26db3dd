//! Foreground heartbeat

use crate::console::CliConsole;
use crate::signal_handler::InterruptGuard;
use slotkeeper_core::{SlotManager, SlotkeeperError, SlotkeeperResult};
use tokio_util::sync::CancellationToken;

pub async fn run(manager: &SlotManager, console: CliConsole) -> SlotkeeperResult<()> {
    let heartbeat = manager.heartbeat().ok_or_else(|| {
        SlotkeeperError::config("heartbeat is disabled; set `heartbeat` or pass --interval")
    })?;

    let cancel = CancellationToken::new();
    let _guard = InterruptGuard::install(cancel.clone())?;
    console.info(&format!(
        "Sending a heartbeat every {}s, Ctrl+C to stop",
        heartbeat.interval().as_secs()
    ));

    let sent = heartbeat.run(cancel).await;
    console.success(&format!("Stopped after {} heartbeats", sent));
    Ok(())
}
