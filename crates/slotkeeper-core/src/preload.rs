//! Batch preload
//!
//! Warms one slot per participant by forcing a minimal generation, then
//! persists the warmed cache. Participants are processed strictly one at a
//! time. A per-participant failure is recorded and the batch moves on; an
//! operator cancellation stops the engine and ends the batch.

use crate::activity::ActivityState;
use crate::config::{GenerationConfig, SlotkeeperConfig};
use crate::engine::{GenerationEngine, GenerationRequest};
use crate::error::{SlotkeeperError, SlotkeeperResult};
use crate::lifecycle::CacheLifecycle;
use crate::pool::{GenerationKind, ParticipantId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress of a preload batch
#[derive(Debug, Default)]
pub struct PreloadJob {
    pub participants: Vec<ParticipantId>,
    /// Index of the next participant to process
    pub cursor: usize,
    pub preloaded: Vec<ParticipantId>,
    pub errors: Vec<(ParticipantId, SlotkeeperError)>,
    pub cancelled: bool,
}

impl PreloadJob {
    pub fn new(participants: Vec<ParticipantId>) -> Self {
        Self {
            participants,
            ..Default::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.participants.len().saturating_sub(self.cursor)
    }

    pub fn is_complete(&self) -> bool {
        self.cancelled || self.remaining() == 0
    }
}

/// Hooks for rendering batch progress
pub trait PreloadObserver: Send + Sync {
    fn on_started(&self, _participant: &ParticipantId, _position: usize, _total: usize) {}

    fn on_finished(&self, _participant: &ParticipantId, _result: &SlotkeeperResult<()>) {}
}

/// Observer that ignores every event
pub struct SilentObserver;

impl PreloadObserver for SilentObserver {}

enum Race {
    Warmed,
    Failed(SlotkeeperError),
    Cancelled,
}

pub struct PreloadOrchestrator {
    lifecycle: Arc<CacheLifecycle>,
    engine: Arc<dyn GenerationEngine>,
    activity: Arc<ActivityState>,
    generation: GenerationConfig,
    timeout: Duration,
}

impl PreloadOrchestrator {
    pub fn new(
        lifecycle: Arc<CacheLifecycle>,
        engine: Arc<dyn GenerationEngine>,
        activity: Arc<ActivityState>,
        config: &SlotkeeperConfig,
    ) -> Self {
        Self {
            lifecycle,
            engine,
            activity,
            generation: config.generation.clone(),
            timeout: config.preload_timeout_duration(),
        }
    }

    /// Override the per-participant budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Preload `participants` for `chat_id`.
    ///
    /// Fails up front only when another batch is already running.
    pub async fn run(
        &self,
        chat_id: &str,
        participants: Vec<ParticipantId>,
        cancel: CancellationToken,
        observer: &dyn PreloadObserver,
    ) -> SlotkeeperResult<PreloadJob> {
        let Some(_guard) = self.activity.start_preload() else {
            return Err(SlotkeeperError::invalid_input(
                "a preload batch is already running",
            ));
        };

        let mut job = PreloadJob::new(participants);
        let total = job.participants.len();
        info!(chat_id, total, "preload started");

        while job.cursor < total {
            if cancel.is_cancelled() {
                job.cancelled = true;
                break;
            }
            let participant = job.participants[job.cursor].clone();
            job.cursor += 1;
            observer.on_started(&participant, job.cursor, total);

            let result = self.preload_one(chat_id, &participant, &job, &cancel).await;
            observer.on_finished(&participant, &result);
            match result {
                Ok(()) => job.preloaded.push(participant),
                Err(SlotkeeperError::Cancelled) => {
                    job.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(participant = %participant, error = %e, "preload failed");
                    job.errors.push((participant, e));
                }
            }
        }

        self.report(&job);
        Ok(job)
    }

    async fn preload_one(
        &self,
        chat_id: &str,
        participant: &ParticipantId,
        job: &PreloadJob,
        cancel: &CancellationToken,
    ) -> SlotkeeperResult<()> {
        if participant.is_empty() {
            return Err(SlotkeeperError::invalid_input_field(
                "participant has no identity",
                "participant",
            ));
        }

        // Participants warmed earlier in this batch must not be evicted.
        let protected: HashSet<ParticipantId> = job.preloaded.iter().cloned().collect();
        let slot = self
            .lifecycle
            .acquire(Some(chat_id), participant, None, &protected)
            .await?;
        debug!(slot, participant = %participant, "preloading");

        let request = GenerationRequest {
            participant: Some(participant.clone()),
            slot: Some(slot),
            prompt: self.generation.render_preload_prompt(participant.as_str()),
            max_tokens: self.generation.preload_max_tokens,
            kind: GenerationKind::Quiet,
        };

        let race = tokio::select! {
            biased;
            _ = cancel.cancelled() => Race::Cancelled,
            result = tokio::time::timeout(self.timeout, self.engine.generate(request)) => match result {
                Ok(Ok(_)) => Race::Warmed,
                Ok(Err(e)) => Race::Failed(e),
                Err(_) => Race::Failed(SlotkeeperError::timeout(
                    format!("Preloading {}", participant),
                    self.timeout.as_secs(),
                )),
            },
        };

        // The prefill is the side effect we want; whatever the engine is
        // still doing can be stopped.
        if let Err(e) = self.engine.stop().await {
            debug!(error = %e, "engine stop failed");
        }

        match race {
            Race::Cancelled => {
                info!(participant = %participant, "preload cancelled");
                Err(SlotkeeperError::Cancelled)
            }
            Race::Failed(e) => Err(e),
            Race::Warmed => {
                {
                    let mut pool = self.lifecycle.pool().lock();
                    if !pool.is_held_by(slot, participant) {
                        warn!(slot, participant = %participant, "slot changed hands during preload");
                        return Err(SlotkeeperError::not_found_resource(
                            format!("slot {} was taken from {} while warming", slot, participant),
                            "slot",
                        ));
                    }
                    pool.set_cache_loaded(slot, true);
                }
                self.lifecycle
                    .save_character_cache(chat_id, participant, slot, None)
                    .await
                    .map(|_| ())
            }
        }
    }

    fn report(&self, job: &PreloadJob) {
        let notices = self.lifecycle.notices();
        info!(
            preloaded = job.preloaded.len(),
            failed = job.errors.len(),
            cancelled = job.cancelled,
            "preload finished"
        );
        if job.cancelled {
            notices.warn(&format!(
                "Preload cancelled after {} of {} participants",
                job.preloaded.len(),
                job.participants.len()
            ));
        } else if job.errors.is_empty() {
            notices.success(&format!("Preloaded {} participants", job.preloaded.len()));
        } else {
            let names: Vec<&str> = job.errors.iter().map(|(p, _)| p.as_str()).collect();
            notices.warn(&format!(
                "Preloaded {} participants, failed: {}",
                job.preloaded.len(),
                names.join(", ")
            ));
        }
    }
}
