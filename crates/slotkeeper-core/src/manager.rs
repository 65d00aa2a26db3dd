//! Host-facing coordinator
//!
//! [`SlotManager`] is the inbound event surface: the host reports chat
//! changes, generation lifecycle and received messages, and the manager
//! keeps the slot pool, the backend and the saved blobs in step.
//!
//! Chat changes are serialized: a second change, or a generation asking for
//! a slot, waits until the first has flushed, cleared and reassigned.

use crate::activity::ActivityState;
use crate::autosave::{AutosaveOutcome, AutosaveScheduler};
use crate::config::SlotkeeperConfig;
use crate::engine::{GenerationEngine, LlamaCompletionEngine};
use crate::error::{SlotkeeperError, SlotkeeperResult};
use crate::gateway::{BlobStore, HttpBlobStore, HttpSlotBackend, SlotBackend};
use crate::heartbeat::HeartbeatScheduler;
use crate::lifecycle::{CacheLifecycle, ClearSummary, FlushSummary, LifecycleSettings, SavedCache};
use crate::notify::{Notices, Notifier};
use crate::pool::{GenerationKind, ParticipantId, SharedSlotPool, SlotPool};
use crate::preload::{PreloadJob, PreloadObserver, PreloadOrchestrator};
use crate::rotation::RotationPolicy;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a chat change currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    ChatChanging,
    Flushing,
    Reassigning,
}

#[derive(Debug)]
pub enum ChatChangeOutcome {
    /// Disabled, or the host did not know the chat
    Ignored,
    /// First chat seen; nothing to flush
    FirstObserved,
    Unchanged,
    /// Chat switched with clearing turned off
    Switched,
    Reassigned {
        flush: FlushSummary,
        cleared: SlotkeeperResult<ClearSummary>,
        assigned: Vec<(usize, ParticipantId)>,
    },
}

/// Slot the next generation request is pinned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTarget {
    pub slot: usize,
    pub participant: ParticipantId,
}

#[derive(Debug, Default)]
struct ManagerState {
    current_chat: Option<String>,
    phase: ChatPhase,
    target: Option<GenerationTarget>,
}

pub struct SlotManager {
    config: SlotkeeperConfig,
    lifecycle: Arc<CacheLifecycle>,
    engine: Arc<dyn GenerationEngine>,
    autosave: AutosaveScheduler,
    activity: Arc<ActivityState>,
    chat_gate: tokio::sync::Mutex<()>,
    state: Mutex<ManagerState>,
}

impl SlotManager {
    pub fn new(
        config: SlotkeeperConfig,
        backend: Arc<dyn SlotBackend>,
        store: Arc<dyn BlobStore>,
        engine: Arc<dyn GenerationEngine>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let notices = Notices::new(notifier, config.show_notifications);
        let pool = SlotPool::shared(config.fallback_slot_count);
        let lifecycle = CacheLifecycle::new(
            backend,
            store.clone(),
            pool,
            RotationPolicy::new(store, config.max_files),
            notices,
            LifecycleSettings::from(&config),
        );
        Self {
            autosave: AutosaveScheduler::new(config.save_interval),
            lifecycle: Arc::new(lifecycle),
            engine,
            activity: ActivityState::new(),
            chat_gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(ManagerState::default()),
            config,
        }
    }

    /// Build a manager talking HTTP to the configured backends
    pub fn connect(
        config: SlotkeeperConfig,
        notifier: Arc<dyn Notifier>,
    ) -> SlotkeeperResult<Self> {
        config.validate()?;
        let backend = Arc::new(HttpSlotBackend::new(&config.backend)?);
        let store = Arc::new(HttpBlobStore::new(
            &config.backend.files_url,
            Duration::from_secs(config.backend.timeouts.connect),
        )?);
        let engine = Arc::new(LlamaCompletionEngine::new(&config.backend)?);
        Ok(Self::new(config, backend, store, engine, notifier))
    }

    /// Size the pool from the backend; returns the slot count
    pub async fn initialize(&self) -> usize {
        self.lifecycle.initialize_pool().await
    }

    pub fn config(&self) -> &SlotkeeperConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Arc<CacheLifecycle> {
        &self.lifecycle
    }

    pub fn pool(&self) -> &SharedSlotPool {
        self.lifecycle.pool()
    }

    pub fn activity(&self) -> &Arc<ActivityState> {
        &self.activity
    }

    pub fn current_chat(&self) -> Option<String> {
        self.state.lock().current_chat.clone()
    }

    pub fn phase(&self) -> ChatPhase {
        self.state.lock().phase
    }

    pub fn target(&self) -> Option<GenerationTarget> {
        self.state.lock().target.clone()
    }

    fn set_phase(&self, phase: ChatPhase) {
        debug!(?phase, "chat phase");
        self.state.lock().phase = phase;
    }

    /// Host reported the active chat.
    ///
    /// `None` or an empty id means the host does not know the chat and is
    /// ignored. Only a change between two known ids triggers flush, clear and
    /// reassignment of `participants` in order.
    pub async fn on_chat_changed(
        &self,
        chat_id: Option<&str>,
        participants: &[ParticipantId],
    ) -> ChatChangeOutcome {
        if !self.config.enabled {
            return ChatChangeOutcome::Ignored;
        }
        let Some(chat_id) = chat_id.map(str::trim).filter(|id| !id.is_empty()) else {
            debug!("chat id unknown, ignoring chat change");
            return ChatChangeOutcome::Ignored;
        };

        let _gate = self.chat_gate.lock().await;

        let previous = {
            let mut state = self.state.lock();
            match state.current_chat.clone() {
                None => {
                    state.current_chat = Some(chat_id.to_string());
                    info!(chat_id, "chat observed");
                    return ChatChangeOutcome::FirstObserved;
                }
                Some(current) if current == chat_id => return ChatChangeOutcome::Unchanged,
                Some(current) => current,
            }
        };

        if !self.config.clear_on_chat_change {
            let mut state = self.state.lock();
            state.current_chat = Some(chat_id.to_string());
            state.target = None;
            info!(from = %previous, to = chat_id, "chat switched, pool kept");
            return ChatChangeOutcome::Switched;
        }

        info!(from = %previous, to = chat_id, "chat changed");
        self.set_phase(ChatPhase::ChatChanging);

        // Caches in the slots belong to the chat being left.
        self.set_phase(ChatPhase::Flushing);
        let flush = self
            .lifecycle
            .save_all_occupied(&previous, self.config.min_usage_for_save)
            .await;
        let cleared = self.lifecycle.clear_all().await;
        if let Err(e) = &cleared {
            warn!(error = %e, "clearing slots failed, reassigning anyway");
        }

        self.set_phase(ChatPhase::Reassigning);
        let assigned = self.pool().lock().assign_in_order(participants);
        {
            let mut state = self.state.lock();
            state.current_chat = Some(chat_id.to_string());
            state.target = None;
            state.phase = ChatPhase::Idle;
        }
        info!(
            saved = flush.saved.len(),
            failed = flush.failed.len(),
            assigned = assigned.len(),
            "chat change finished"
        );

        ChatChangeOutcome::Reassigned {
            flush,
            cleared,
            assigned,
        }
    }

    /// Acquire a slot for `participant` and warm it before tokens are produced.
    ///
    /// A slot without a loaded cache gets the newest saved blob for the
    /// current chat; with no blob it is marked loaded and warms from scratch.
    /// A failed load is reported and the generation proceeds cold. Waits
    /// for a chat change in progress to finish first.
    pub async fn on_generation_begin(
        &self,
        participant: &ParticipantId,
        kind: GenerationKind,
    ) -> SlotkeeperResult<Option<usize>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let _gate = self.chat_gate.lock().await;
        let chat_id = self.current_chat();
        self.activity.begin_generation();

        let slot = match self
            .lifecycle
            .acquire(
                chat_id.as_deref(),
                participant,
                Some(self.config.min_usage_for_eviction_save),
                &HashSet::new(),
            )
            .await
        {
            Ok(slot) => slot,
            Err(e) => {
                self.activity.end_generation();
                self.lifecycle
                    .notices()
                    .error(&format!("No slot for {}: {}", participant, e));
                return Err(e);
            }
        };

        let needs_warm = {
            let mut pool = self.pool().lock();
            pool.set_pending_generation(slot, Some(kind));
            pool.slot(slot).is_some_and(|s| !s.cache_loaded())
        };
        self.state.lock().target = Some(GenerationTarget {
            slot,
            participant: participant.clone(),
        });

        if let (true, Some(chat_id)) = (needs_warm, chat_id.as_deref()) {
            match self.lifecycle.load_latest(chat_id, participant, slot).await {
                Ok(Some(blob)) => debug!(slot, blob = %blob, "slot warmed from saved cache"),
                Ok(None) => {
                    let mut pool = self.pool().lock();
                    if pool.is_held_by(slot, participant) {
                        pool.set_cache_loaded(slot, true);
                    }
                }
                Err(e) => warn!(slot, error = %e, "warming failed, generating cold"),
            }
        }

        Ok(Some(slot))
    }

    /// Pin the upcoming generation to the participant's slot, if it holds one
    pub fn on_generation_about_to_run(
        &self,
        participant: &ParticipantId,
        kind: GenerationKind,
    ) -> Option<usize> {
        if !self.config.enabled {
            return None;
        }
        let slot = {
            let mut pool = self.pool().lock();
            let slot = pool.find_by_participant(participant)?;
            pool.set_pending_generation(slot, Some(kind));
            slot
        };
        self.state.lock().target = Some(GenerationTarget {
            slot,
            participant: participant.clone(),
        });
        Some(slot)
    }

    /// Inject `id_slot` into the outgoing generation settings
    pub fn on_settings_ready(&self, settings: &mut Value) -> Option<usize> {
        if !self.config.enabled {
            return None;
        }
        let slot = self.state.lock().target.as_ref()?.slot;
        let object = settings.as_object_mut()?;
        object.insert("id_slot".to_string(), Value::from(slot));
        Some(slot)
    }

    /// A generated message arrived for `participant`
    pub async fn on_message_received(
        &self,
        participant: &ParticipantId,
    ) -> Option<AutosaveOutcome> {
        self.activity.end_generation();
        if !self.config.enabled {
            return None;
        }
        self.state.lock().target = None;
        let Some(chat_id) = self.current_chat() else {
            debug!("no active chat, skipping autosave");
            return None;
        };
        Some(
            self.autosave
                .on_message_received(&self.lifecycle, &chat_id, participant)
                .await,
        )
    }

    /// The generation ended without a message (stopped or failed)
    pub fn on_generation_ended(&self) {
        self.activity.end_generation();
        let target = self.state.lock().target.take();
        if let Some(target) = target {
            self.pool().lock().take_pending_generation(target.slot);
        }
    }

    /// Save the participant's slot now, optionally under a tag
    pub async fn save_participant(
        &self,
        participant: &ParticipantId,
        tag: Option<&str>,
    ) -> SlotkeeperResult<SavedCache> {
        let chat_id = self
            .current_chat()
            .ok_or_else(|| SlotkeeperError::invalid_input("no active chat"))?;
        let slot = self
            .pool()
            .lock()
            .find_by_participant(participant)
            .ok_or_else(|| {
                SlotkeeperError::not_found_resource(
                    format!("{} does not hold a slot", participant),
                    "slot",
                )
            })?;
        self.lifecycle
            .save_character_cache(&chat_id, participant, slot, tag)
            .await
    }

    /// Erase every backend slot and empty the pool
    pub async fn clear_all_slots(&self) -> SlotkeeperResult<ClearSummary> {
        let summary = self.lifecycle.clear_all().await?;
        self.pool().lock().reset_all();
        self.state.lock().target = None;
        Ok(summary)
    }

    pub fn preload_orchestrator(&self) -> PreloadOrchestrator {
        PreloadOrchestrator::new(
            self.lifecycle.clone(),
            self.engine.clone(),
            self.activity.clone(),
            &self.config,
        )
    }

    /// Preload `participants` into the current chat
    pub async fn preload(
        &self,
        participants: Vec<ParticipantId>,
        cancel: CancellationToken,
        observer: &dyn PreloadObserver,
    ) -> SlotkeeperResult<PreloadJob> {
        let chat_id = self
            .current_chat()
            .ok_or_else(|| SlotkeeperError::invalid_input("no active chat to preload into"))?;
        self.preload_orchestrator()
            .run(&chat_id, participants, cancel, observer)
            .await
    }

    /// Heartbeat scheduler sharing this manager's pool and activity flags
    pub fn heartbeat(&self) -> Option<HeartbeatScheduler> {
        HeartbeatScheduler::from_config(
            &self.config,
            self.engine.clone(),
            self.lifecycle.backend().clone(),
            self.pool().clone(),
            self.activity.clone(),
            self.lifecycle.notices().clone(),
        )
    }
}
