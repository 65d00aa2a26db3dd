//! Shared activity flags
//!
//! The heartbeat consults these instead of taking a lock: it simply skips a
//! tick while a generation or a preload batch is running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ActivityState {
    generating: AtomicBool,
    preloading: AtomicBool,
}

impl ActivityState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn begin_generation(&self) {
        self.generating.store(true, Ordering::SeqCst);
    }

    pub fn end_generation(&self) {
        self.generating.store(false, Ordering::SeqCst);
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    pub fn is_preloading(&self) -> bool {
        self.preloading.load(Ordering::SeqCst)
    }

    /// Mark a preload batch as running until the guard is dropped.
    ///
    /// Returns `None` when another batch is already running.
    pub fn start_preload(self: &Arc<Self>) -> Option<PreloadGuard> {
        self.preloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PreloadGuard {
                state: Arc::clone(self),
            })
    }
}

/// Clears the preloading flag on drop
#[derive(Debug)]
pub struct PreloadGuard {
    state: Arc<ActivityState>,
}

impl Drop for PreloadGuard {
    fn drop(&mut self) {
        self.state.preloading.store(false, Ordering::SeqCst);
    }
}
