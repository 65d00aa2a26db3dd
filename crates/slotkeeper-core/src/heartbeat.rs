//! Idle keepalive
//!
//! Sends a trivial generation at a fixed period so the backend does not
//! unload the model. A tick is skipped while a generation or a preload batch
//! is running, or while the backend reports a busy slot.
//!
//! The request is always pinned. A free slot is used when there is one;
//! otherwise an occupant with no unsaved messages gives up its warm cache
//! and is restored from its blob on its next generation.

use crate::activity::ActivityState;
use crate::config::{SlotkeeperConfig, timeouts};
use crate::engine::{GenerationEngine, GenerationRequest};
use crate::error::{ErrorKind, SlotkeeperError};
use crate::gateway::SlotBackend;
use crate::notify::Notices;
use crate::pool::{GenerationKind, SharedSlotPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Generating,
    Preloading,
    BackendBusy,
    /// Every slot holds unsaved messages
    NoSpareSlot,
}

#[derive(Debug)]
pub enum HeartbeatTick {
    Sent { slot: usize },
    Skipped(SkipReason),
    Failed(SlotkeeperError),
}

pub struct HeartbeatScheduler {
    engine: Arc<dyn GenerationEngine>,
    backend: Arc<dyn SlotBackend>,
    pool: SharedSlotPool,
    activity: Arc<ActivityState>,
    notices: Notices,
    interval: Duration,
    prompt: String,
    budget: Duration,
}

impl HeartbeatScheduler {
    /// `None` when the heartbeat is disabled in `config`
    pub fn from_config(
        config: &SlotkeeperConfig,
        engine: Arc<dyn GenerationEngine>,
        backend: Arc<dyn SlotBackend>,
        pool: SharedSlotPool,
        activity: Arc<ActivityState>,
        notices: Notices,
    ) -> Option<Self> {
        let interval = config.heartbeat_interval()?;
        Some(Self {
            engine,
            backend,
            pool,
            activity,
            notices,
            interval,
            prompt: config.generation.heartbeat_prompt.clone(),
            budget: timeouts::generation::heartbeat_timeout(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one heartbeat attempt
    pub async fn tick(&self) -> HeartbeatTick {
        if self.activity.is_preloading() {
            return HeartbeatTick::Skipped(SkipReason::Preloading);
        }
        if self.activity.is_generating() {
            return HeartbeatTick::Skipped(SkipReason::Generating);
        }

        match self.backend.slots().await {
            Ok(slots) if slots.iter().any(|s| s.is_processing) => {
                return HeartbeatTick::Skipped(SkipReason::BackendBusy);
            }
            Ok(_) => {}
            // A slow slot report means the server is busy generating.
            Err(e) if e.kind() == ErrorKind::Timeout => {
                debug!(error = %e, "slot info timed out, skipping heartbeat");
                return HeartbeatTick::Skipped(SkipReason::BackendBusy);
            }
            Err(e) => {
                debug!(error = %e, "slot info unavailable, sending heartbeat anyway");
            }
        }

        let slot = {
            let mut pool = self.pool.lock();
            match pool.slots().iter().position(|s| s.is_free()) {
                Some(free) => free,
                None => {
                    let Some(spare) = pool.slots().iter().position(|s| s.usage() == 0) else {
                        return HeartbeatTick::Skipped(SkipReason::NoSpareSlot);
                    };
                    pool.set_cache_loaded(spare, false);
                    debug!(slot = spare, "no free slot, heartbeat overwrites a saved cache");
                    spare
                }
            }
        };
        let request = GenerationRequest {
            participant: None,
            slot: Some(slot),
            prompt: self.prompt.clone(),
            max_tokens: 1,
            kind: GenerationKind::Quiet,
        };

        match tokio::time::timeout(self.budget, self.engine.generate(request)).await {
            Ok(Ok(_)) => {
                debug!(slot, "heartbeat sent");
                HeartbeatTick::Sent { slot }
            }
            Ok(Err(e)) => self.failed(e),
            Err(_) => {
                if let Err(e) = self.engine.stop().await {
                    debug!(error = %e, "engine stop failed");
                }
                self.failed(SlotkeeperError::timeout("Heartbeat", self.budget.as_secs()))
            }
        }
    }

    fn failed(&self, error: SlotkeeperError) -> HeartbeatTick {
        warn!(error = %error, "heartbeat failed");
        self.notices.warn(&format!("Heartbeat failed: {}", error));
        HeartbeatTick::Failed(error)
    }

    /// Tick every interval until cancelled; returns the number of heartbeats sent
    pub async fn run(&self, cancel: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(interval = ?self.interval, "heartbeat started");
        let mut sent = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.tick().await {
                        HeartbeatTick::Sent { .. } => sent += 1,
                        HeartbeatTick::Skipped(reason) => debug!(?reason, "heartbeat skipped"),
                        HeartbeatTick::Failed(_) => {}
                    }
                }
            }
        }
        info!(sent, "heartbeat stopped");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{GenerationOutput, MockGenerationEngine};
    use crate::pool::{ParticipantId, SlotPool};
    use crate::testing::{FakeBlobStore, FakeSlotBackend};
    use std::collections::HashSet;

    fn config(seconds: u64) -> SlotkeeperConfig {
        SlotkeeperConfig {
            heartbeat: seconds,
            ..Default::default()
        }
    }

    fn scheduler(
        engine: MockGenerationEngine,
        backend: Arc<FakeSlotBackend>,
        pool: SharedSlotPool,
        activity: Arc<ActivityState>,
    ) -> HeartbeatScheduler {
        HeartbeatScheduler::from_config(
            &config(30),
            Arc::new(engine),
            backend,
            pool,
            activity,
            Notices::silent(),
        )
        .expect("heartbeat enabled")
    }

    fn backend(slots: usize) -> Arc<FakeSlotBackend> {
        Arc::new(FakeSlotBackend::new(Arc::new(FakeBlobStore::default()), slots))
    }

    #[test]
    fn test_disabled_when_zero() {
        let scheduler = HeartbeatScheduler::from_config(
            &config(0),
            Arc::new(MockGenerationEngine::new()),
            backend(1),
            SlotPool::shared(1),
            ActivityState::new(),
            Notices::silent(),
        );
        assert!(scheduler.is_none());
    }

    #[tokio::test]
    async fn test_skips_while_generating_or_preloading() {
        let mut engine = MockGenerationEngine::new();
        engine.expect_generate().never();
        let activity = ActivityState::new();
        let hb = scheduler(engine, backend(2), SlotPool::shared(2), activity.clone());

        activity.begin_generation();
        assert!(matches!(hb.tick().await, HeartbeatTick::Skipped(SkipReason::Generating)));
        activity.end_generation();

        let _guard = activity.start_preload().unwrap();
        assert!(matches!(hb.tick().await, HeartbeatTick::Skipped(SkipReason::Preloading)));
    }

    #[tokio::test]
    async fn test_skips_when_backend_busy_or_slow() {
        let mut engine = MockGenerationEngine::new();
        engine.expect_generate().never();
        let backend = backend(2);
        let hb = scheduler(engine, backend.clone(), SlotPool::shared(2), ActivityState::new());

        backend.set_processing(1, true);
        assert!(matches!(hb.tick().await, HeartbeatTick::Skipped(SkipReason::BackendBusy)));

        backend.set_processing(1, false);
        backend.fail_slots(Some(SlotkeeperError::timeout("Reading slots", 5)));
        assert!(matches!(hb.tick().await, HeartbeatTick::Skipped(SkipReason::BackendBusy)));
    }

    #[tokio::test]
    async fn test_targets_free_slot() {
        let mut engine = MockGenerationEngine::new();
        engine
            .expect_generate()
            .withf(|request| request.slot == Some(1) && request.max_tokens == 1)
            .times(1)
            .returning(|_| Ok(GenerationOutput::default()));
        let pool = SlotPool::shared(2);
        pool.lock()
            .acquire_unsaved(&ParticipantId::new("A"), &HashSet::new())
            .unwrap();
        let hb = scheduler(engine, backend(2), pool, ActivityState::new());

        assert!(matches!(hb.tick().await, HeartbeatTick::Sent { slot: 1 }));
    }

    #[tokio::test]
    async fn test_full_pool_uses_idle_occupant_and_marks_it_cold() {
        let mut engine = MockGenerationEngine::new();
        engine
            .expect_generate()
            .withf(|request| request.slot == Some(1))
            .times(1)
            .returning(|_| Ok(GenerationOutput::default()));
        let pool = SlotPool::shared(2);
        {
            let mut pool = pool.lock();
            pool.assign_in_order(&[ParticipantId::new("A"), ParticipantId::new("B")]);
            pool.set_cache_loaded(0, true);
            pool.set_cache_loaded(1, true);
            pool.increment_usage(0);
        }
        let hb = scheduler(engine, backend(2), pool.clone(), ActivityState::new());

        assert!(matches!(hb.tick().await, HeartbeatTick::Sent { slot: 1 }));
        let pool = pool.lock();
        assert!(pool.slot(0).unwrap().cache_loaded());
        assert!(!pool.slot(1).unwrap().cache_loaded());
    }

    #[tokio::test]
    async fn test_full_pool_with_unsaved_work_everywhere_is_skipped() {
        let mut engine = MockGenerationEngine::new();
        engine.expect_generate().never();
        let pool = SlotPool::shared(2);
        {
            let mut pool = pool.lock();
            pool.assign_in_order(&[ParticipantId::new("A"), ParticipantId::new("B")]);
            pool.increment_usage(0);
            pool.increment_usage(1);
        }
        let hb = scheduler(engine, backend(2), pool, ActivityState::new());

        assert!(matches!(
            hb.tick().await,
            HeartbeatTick::Skipped(SkipReason::NoSpareSlot)
        ));
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let mut engine = MockGenerationEngine::new();
        engine
            .expect_generate()
            .times(1)
            .returning(|_| Err(SlotkeeperError::backend("model unloaded")));
        let hb = scheduler(engine, backend(1), SlotPool::shared(1), ActivityState::new());

        assert!(matches!(hb.tick().await, HeartbeatTick::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_cancelled() {
        let mut engine = MockGenerationEngine::new();
        engine
            .expect_generate()
            .times(3)
            .returning(|_| Ok(GenerationOutput::default()));
        let hb = scheduler(engine, backend(1), SlotPool::shared(1), ActivityState::new());
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(100)).await;
                cancel.cancel();
            })
        };
        let sent = hb.run(cancel).await;
        stopper.await.unwrap();
        assert_eq!(sent, 3);
    }
}
