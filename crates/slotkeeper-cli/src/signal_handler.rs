//! Ctrl+C handling for long-running commands

use futures::stream::StreamExt;
use signal_hook::consts::SIGINT;
use signal_hook_tokio::Signals;
use slotkeeper_core::{SlotkeeperError, SlotkeeperResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `token` on the first SIGINT; a second one exits immediately
pub struct InterruptGuard {
    handle: signal_hook_tokio::Handle,
    task: JoinHandle<()>,
}

impl InterruptGuard {
    pub fn install(token: CancellationToken) -> SlotkeeperResult<Self> {
        let mut signals = Signals::new([SIGINT])
            .map_err(|e| SlotkeeperError::io(format!("Failed to install signal handler: {}", e)))?;
        let handle = signals.handle();

        let task = tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                if signal != SIGINT {
                    continue;
                }
                if token.is_cancelled() {
                    eprintln!("\nForced exit");
                    std::process::exit(130);
                }
                eprintln!("\n🛑 Cancelling... (Ctrl+C again to force)");
                token.cancel();
            }
        });

        Ok(Self { handle, task })
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.close();
        self.task.abort();
    }
}
