//! Cache lifecycle
//!
//! Save, load and clear KV caches on the backend while keeping the slot pool
//! consistent with what the backend holds. Every backend call runs without
//! the pool lock held; pool updates that depend on occupancy are re-checked
//! after the call returns.

use crate::config::SlotkeeperConfig;
use crate::error::{ErrorKind, SlotkeeperError, SlotkeeperResult};
use crate::gateway::{BlobStore, SlotBackend, SlotTransfer};
use crate::naming::CacheBlobName;
use crate::notify::Notices;
use crate::pool::{AcquirePlan, ParticipantId, SharedSlotPool};
use crate::rotation::{RotationPolicy, RotationReport};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Re-plans allowed when the pool changes under an eviction save
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSettings {
    pub settle_delay: Duration,
    pub min_blob_size_bytes: u64,
    pub fallback_slot_count: usize,
}

impl From<&SlotkeeperConfig> for LifecycleSettings {
    fn from(config: &SlotkeeperConfig) -> Self {
        Self {
            settle_delay: config.settle_delay,
            min_blob_size_bytes: config.min_blob_size_bytes,
            fallback_slot_count: config.fallback_slot_count,
        }
    }
}

/// A save that passed validation
#[derive(Debug)]
pub struct SavedCache {
    pub blob: CacheBlobName,
    /// `None` when the listing was unavailable and the size went unchecked
    pub size_bytes: Option<u64>,
    pub transfer: SlotTransfer,
    pub rotation: Option<RotationReport>,
}

/// Result of erasing every slot
#[derive(Debug, Default)]
pub struct ClearSummary {
    pub cleared: Vec<usize>,
    pub failed: Vec<(usize, SlotkeeperError)>,
}

/// Result of saving every occupied slot
#[derive(Debug, Default)]
pub struct FlushSummary {
    pub saved: Vec<ParticipantId>,
    pub skipped: Vec<ParticipantId>,
    pub failed: Vec<(ParticipantId, SlotkeeperError)>,
}

/// Saved blobs of one (chat, participant) pair, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct SaveGroup {
    pub chat_id: String,
    pub participant: String,
    pub saves: Vec<(CacheBlobName, u64)>,
}

pub struct CacheLifecycle {
    backend: Arc<dyn SlotBackend>,
    store: Arc<dyn BlobStore>,
    pool: SharedSlotPool,
    rotation: RotationPolicy,
    notices: Notices,
    settings: LifecycleSettings,
}

impl CacheLifecycle {
    pub fn new(
        backend: Arc<dyn SlotBackend>,
        store: Arc<dyn BlobStore>,
        pool: SharedSlotPool,
        rotation: RotationPolicy,
        notices: Notices,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            backend,
            store,
            pool,
            rotation,
            notices,
            settings,
        }
    }

    pub fn pool(&self) -> &SharedSlotPool {
        &self.pool
    }

    pub fn backend(&self) -> &Arc<dyn SlotBackend> {
        &self.backend
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    /// Size the pool from the backend's slot report.
    ///
    /// Falls back to the configured count when the report is unavailable or
    /// empty. All occupancy is dropped.
    pub async fn initialize_pool(&self) -> usize {
        let size = match self.backend.slots().await {
            Ok(slots) if !slots.is_empty() => slots.len(),
            Ok(_) => {
                warn!(
                    fallback = self.settings.fallback_slot_count,
                    "backend reported no slots, using fallback count"
                );
                self.settings.fallback_slot_count
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = self.settings.fallback_slot_count,
                    "could not read slot count, using fallback count"
                );
                self.settings.fallback_slot_count
            }
        };
        self.pool.lock().reinitialize(size);
        info!(slots = size, "slot pool initialized");
        size
    }

    /// Persist the slot to `blob` and validate the result.
    ///
    /// Nothing is sent unless `participant` holds the slot when the save
    /// starts. Success means the backend wrote a file at least
    /// `min_blob_size_bytes` long (or the listing could not be checked).
    /// Untagged saves trigger rotation. Messages counted before the save are
    /// taken off the usage counter only while `participant` still holds the
    /// slot.
    #[instrument(skip(self, blob), fields(blob = %blob), level = "debug")]
    pub async fn save(
        &self,
        slot: usize,
        blob: &CacheBlobName,
        participant: &ParticipantId,
    ) -> SlotkeeperResult<SavedCache> {
        let filename = blob.encode();

        let saved_usage = {
            let pool = self.pool.lock();
            match pool.slot(slot) {
                Some(state) if pool.is_held_by(slot, participant) => state.usage(),
                _ => {
                    warn!(slot, participant = %participant, "slot changed hands, save not sent");
                    return Err(SlotkeeperError::not_found_resource(
                        format!("slot {} is no longer held by {}", slot, participant),
                        "slot",
                    ));
                }
            }
        };

        let transfer = match self.backend.save(slot, &filename).await {
            Ok(transfer) => transfer,
            Err(e) => {
                self.report_save_failure(participant, &e);
                return Err(e);
            }
        };

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        let size_bytes = match self.store.size_of(&filename).await {
            Ok(Some(size)) => Some(size),
            Ok(None) => {
                let e = SlotkeeperError::invalid(
                    format!("{} is missing after the backend reported a save", filename),
                    None,
                );
                self.report_save_failure(participant, &e);
                return Err(e);
            }
            Err(e) => {
                warn!(blob = %filename, error = %e, "could not verify saved size, accepting save");
                None
            }
        };

        if let Some(size) = size_bytes {
            if size < self.settings.min_blob_size_bytes {
                if let Err(e) = self.store.delete(&filename).await {
                    warn!(blob = %filename, error = %e, "failed to delete undersized cache");
                }
                let e = SlotkeeperError::invalid(
                    format!(
                        "{} is {} but at least {} is required",
                        filename,
                        format_size(size),
                        format_size(self.settings.min_blob_size_bytes)
                    ),
                    Some(size),
                );
                self.report_save_failure(participant, &e);
                return Err(e);
            }
        }

        let rotation = if blob.is_tagged() {
            None
        } else {
            match self.rotation.rotate(blob.chat_id(), participant).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "rotation skipped, listing failed");
                    None
                }
            }
        };

        let still_held = {
            let mut pool = self.pool.lock();
            let held = pool.is_held_by(slot, participant);
            if held {
                pool.consume_usage(slot, saved_usage);
            }
            held
        };

        info!(
            slot,
            participant = %participant,
            blob = %filename,
            size = ?size_bytes,
            tokens = ?transfer.tokens,
            "cache saved"
        );
        if still_held {
            let size = size_bytes.map(format_size).unwrap_or_else(|| "unknown size".to_string());
            self.notices
                .success(&format!("Saved cache for {} ({})", participant, size));
        } else {
            debug!(slot, "slot changed hands during save, usage left untouched");
        }

        Ok(SavedCache {
            blob: blob.clone(),
            size_bytes,
            transfer,
            rotation,
        })
    }

    /// Save under a fresh name for `chat_id`
    pub async fn save_character_cache(
        &self,
        chat_id: &str,
        participant: &ParticipantId,
        slot: usize,
        tag: Option<&str>,
    ) -> SlotkeeperResult<SavedCache> {
        let blob = CacheBlobName::now(chat_id, tag, participant.as_str());
        self.save(slot, &blob, participant).await
    }

    /// Restore `blob` into the slot.
    ///
    /// On success the slot is marked loaded and its usage reset, provided
    /// `participant` still holds it.
    #[instrument(skip(self, blob), fields(blob = %blob), level = "debug")]
    pub async fn load(
        &self,
        slot: usize,
        blob: &CacheBlobName,
        participant: &ParticipantId,
    ) -> SlotkeeperResult<SlotTransfer> {
        let filename = blob.encode();
        match self.backend.restore(slot, &filename).await {
            Ok(transfer) => {
                let still_held = {
                    let mut pool = self.pool.lock();
                    let held = pool.is_held_by(slot, participant);
                    if held {
                        pool.set_cache_loaded(slot, true);
                        pool.reset_usage(slot);
                    }
                    held
                };
                info!(slot, participant = %participant, blob = %filename, "cache loaded");
                if still_held {
                    self.notices
                        .success(&format!("Loaded cache for {}", participant));
                }
                Ok(transfer)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::NotFound => self.notices.warn(&format!(
                        "Cache {} for {} no longer exists",
                        filename, participant
                    )),
                    ErrorKind::Timeout => self.notices.error(&format!(
                        "Loading cache for {} timed out",
                        participant
                    )),
                    _ => self.notices.error(&format!(
                        "Failed to load cache for {}: {}",
                        participant, e
                    )),
                }
                warn!(slot, blob = %filename, error = %e, "cache load failed");
                Err(e)
            }
        }
    }

    /// Newest blob for the pair, tagged or not
    pub async fn latest_blob(
        &self,
        chat_id: &str,
        participant: &ParticipantId,
    ) -> SlotkeeperResult<Option<CacheBlobName>> {
        let entries = self.store.list().await?;
        Ok(entries
            .iter()
            .filter_map(|entry| CacheBlobName::decode(&entry.name))
            .filter(|name| name.belongs_to(chat_id, participant.as_str()))
            .max_by(|a, b| {
                a.timestamp()
                    .cmp(&b.timestamp())
                    .then_with(|| a.encode().cmp(&b.encode()))
            }))
    }

    /// Load the newest blob for the pair, if there is one
    pub async fn load_latest(
        &self,
        chat_id: &str,
        participant: &ParticipantId,
        slot: usize,
    ) -> SlotkeeperResult<Option<CacheBlobName>> {
        let Some(blob) = self.latest_blob(chat_id, participant).await? else {
            debug!(chat_id, participant = %participant, "no saved cache to load");
            return Ok(None);
        };
        self.load(slot, &blob, participant).await?;
        Ok(Some(blob))
    }

    /// Erase one slot on the backend.
    ///
    /// Pool state is left alone; callers that clear as part of a wider
    /// operation reset the pool themselves.
    pub async fn clear(&self, slot: usize) -> SlotkeeperResult<()> {
        match self.backend.erase(slot).await {
            Ok(()) => {
                debug!(slot, "slot cleared");
                Ok(())
            }
            Err(e) => {
                warn!(slot, error = %e, "failed to clear slot");
                Err(e)
            }
        }
    }

    /// Erase every backend slot.
    ///
    /// The slot count comes from the backend, or from the pool when the
    /// backend cannot report it. Fails only when no slot could be cleared.
    pub async fn clear_all(&self) -> SlotkeeperResult<ClearSummary> {
        let count = match self.backend.slots().await {
            Ok(slots) if !slots.is_empty() => slots.len(),
            Ok(_) => self.pool.lock().len(),
            Err(e) => {
                let fallback = self.pool.lock().len();
                warn!(error = %e, fallback, "could not read slot count, clearing pool-sized range");
                fallback
            }
        };

        let mut summary = ClearSummary::default();
        for slot in 0..count {
            match self.clear(slot).await {
                Ok(()) => summary.cleared.push(slot),
                Err(e) => summary.failed.push((slot, e)),
            }
        }

        if summary.cleared.is_empty() && !summary.failed.is_empty() {
            let (_, first) = summary.failed.remove(0);
            self.notices
                .error(&format!("Failed to clear any of {} slots: {}", count, first));
            return Err(first.with_context(format!("none of {} slots cleared", count)));
        }

        if summary.failed.is_empty() {
            self.notices.info(&format!("Cleared {} slots", summary.cleared.len()));
        } else {
            self.notices.warn(&format!(
                "Cleared {} of {} slots",
                summary.cleared.len(),
                count
            ));
        }
        info!(cleared = summary.cleared.len(), failed = summary.failed.len(), "slots cleared");
        Ok(summary)
    }

    /// Save every occupant whose usage reached `min_usage`.
    ///
    /// Saves run one after another; a failure is recorded and the rest
    /// continue.
    pub async fn save_all_occupied(&self, chat_id: &str, min_usage: u32) -> FlushSummary {
        let occupied = self.pool.lock().occupied();
        let mut summary = FlushSummary::default();

        for (slot, participant, usage) in occupied {
            if usage < min_usage {
                debug!(slot, participant = %participant, usage, "below flush threshold, skipping");
                summary.skipped.push(participant);
                continue;
            }
            match self
                .save_character_cache(chat_id, &participant, slot, None)
                .await
            {
                Ok(_) => summary.saved.push(participant),
                Err(e) => summary.failed.push((participant, e)),
            }
        }
        summary
    }

    /// Give `participant` a slot, saving an evicted occupant first when its
    /// usage reached `eviction_save_threshold`.
    ///
    /// `None` as threshold never saves. A failed eviction save is reported
    /// and the eviction proceeds.
    pub async fn acquire(
        &self,
        chat_id: Option<&str>,
        participant: &ParticipantId,
        eviction_save_threshold: Option<u32>,
        protected: &HashSet<ParticipantId>,
    ) -> SlotkeeperResult<usize> {
        for attempt in 0..MAX_ACQUIRE_ATTEMPTS {
            let plan = self.pool.lock().plan_acquire(participant, protected)?;

            if let AcquirePlan::Evict {
                index,
                victim,
                usage,
            } = &plan
            {
                let should_save = eviction_save_threshold.is_some_and(|min| *usage >= min);
                match (should_save, chat_id) {
                    (true, Some(chat_id)) => {
                        info!(slot = index, victim = %victim, usage, "saving evicted occupant");
                        if let Err(e) = self
                            .save_character_cache(chat_id, victim, *index, None)
                            .await
                        {
                            warn!(victim = %victim, error = %e, "eviction save failed, evicting anyway");
                        }
                    }
                    (true, None) => {
                        warn!(victim = %victim, "no active chat, evicting without save");
                    }
                    (false, _) => {
                        debug!(slot = index, victim = %victim, usage, "evicting without save");
                    }
                }
            }

            if self.pool.lock().occupy(&plan, participant) {
                debug!(slot = plan.index(), participant = %participant, "slot acquired");
                return Ok(plan.index());
            }
            debug!(attempt, "slot changed during acquisition, re-planning");
        }

        Err(SlotkeeperError::other(format!(
            "slot pool kept changing while acquiring a slot for {}",
            participant
        )))
    }

    /// Run retention for the pair outside of a save
    pub async fn rotate(
        &self,
        chat_id: &str,
        participant: &ParticipantId,
    ) -> SlotkeeperResult<RotationReport> {
        self.rotation.rotate(chat_id, participant).await
    }

    /// Every decodable blob, grouped by (chat, participant)
    pub async fn list_saves(&self) -> SlotkeeperResult<Vec<SaveGroup>> {
        let entries = self.store.list().await?;
        let mut groups: BTreeMap<(String, String), Vec<(CacheBlobName, u64)>> = BTreeMap::new();
        for entry in entries {
            if let Some(name) = CacheBlobName::decode(&entry.name) {
                groups
                    .entry((name.chat_id().to_string(), name.participant().to_string()))
                    .or_default()
                    .push((name, entry.size));
            }
        }

        Ok(groups
            .into_iter()
            .map(|((chat_id, participant), mut saves)| {
                saves.sort_by(|(a, _), (b, _)| b.timestamp().cmp(&a.timestamp()));
                SaveGroup {
                    chat_id,
                    participant,
                    saves,
                }
            })
            .collect())
    }

    fn report_save_failure(&self, participant: &ParticipantId, error: &SlotkeeperError) {
        warn!(participant = %participant, error = %error, "cache save failed");
        let message = match error.kind() {
            ErrorKind::Timeout => format!("Saving cache for {} timed out", participant),
            ErrorKind::Invalid => format!(
                "Saved cache for {} was invalid and has been discarded",
                participant
            ),
            _ => format!("Failed to save cache for {}: {}", participant, error),
        };
        self.notices.error(&message);
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
