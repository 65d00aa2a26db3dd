//! Preload progress bar

use indicatif::{ProgressBar, ProgressStyle};
use slotkeeper_core::{ParticipantId, PreloadObserver, SlotkeeperResult};

pub struct PreloadProgress {
    bar: ProgressBar,
}

impl PreloadProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("{spinner:.blue} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PreloadObserver for PreloadProgress {
    fn on_started(&self, participant: &ParticipantId, _position: usize, _total: usize) {
        self.bar.set_message(format!("warming {}", participant));
    }

    fn on_finished(&self, participant: &ParticipantId, result: &SlotkeeperResult<()>) {
        match result {
            Ok(()) => self.bar.println(format!("  ✓ {}", participant)),
            Err(e) => self.bar.println(format!("  ✗ {}: {}", participant, e)),
        }
        self.bar.inc(1);
    }
}
