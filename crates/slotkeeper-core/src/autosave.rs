//! Usage counting and periodic saves
//!
//! Each completed generation counts against its slot. Only normal
//! generations count, except that the first message on a fresh slot always
//! does so that a new occupant gets saved eventually. Once the count reaches
//! the interval the slot is saved; a successful save resets the count.

use crate::error::SlotkeeperError;
use crate::lifecycle::{CacheLifecycle, SavedCache};
use crate::pool::{GenerationKind, ParticipantId, SlotPool};
use tracing::{debug, info};

#[derive(Debug)]
pub enum AutosaveOutcome {
    /// The participant holds no slot
    NoSlot,
    /// Usage recorded, no save due
    Counted { slot: usize, usage: u32 },
    Saved { slot: usize, saved: Box<SavedCache> },
    /// The save failed; usage stays so the next message retries
    SaveFailed {
        slot: usize,
        usage: u32,
        error: SlotkeeperError,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct AutosaveScheduler {
    interval: u32,
}

impl AutosaveScheduler {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Count the message against `slot` and report whether a save is due.
    ///
    /// Consumes the slot's pending generation kind.
    pub fn record(&self, pool: &mut SlotPool, slot: usize) -> Option<(u32, bool)> {
        let current = pool.slot(slot).filter(|s| !s.is_free())?.usage();
        let kind = pool.take_pending_generation(slot);

        let counts = matches!(kind, Some(GenerationKind::Normal)) || current == 0;
        let usage = if counts {
            pool.increment_usage(slot)?
        } else {
            current
        };
        Some((usage, usage >= self.interval))
    }

    /// Handle a received message for `participant` in `chat_id`
    pub async fn on_message_received(
        &self,
        lifecycle: &CacheLifecycle,
        chat_id: &str,
        participant: &ParticipantId,
    ) -> AutosaveOutcome {
        let recorded = {
            let mut pool = lifecycle.pool().lock();
            pool.find_by_participant(participant)
                .and_then(|slot| self.record(&mut pool, slot).map(|r| (slot, r)))
        };
        let Some((slot, (usage, due))) = recorded else {
            debug!(participant = %participant, "message from participant without a slot");
            return AutosaveOutcome::NoSlot;
        };

        if !due {
            debug!(slot, usage, interval = self.interval, "usage recorded");
            return AutosaveOutcome::Counted { slot, usage };
        }

        info!(slot, participant = %participant, usage, "autosave due");
        match lifecycle
            .save_character_cache(chat_id, participant, slot, None)
            .await
        {
            Ok(saved) => AutosaveOutcome::Saved {
                slot,
                saved: Box::new(saved),
            },
            Err(error) => AutosaveOutcome::SaveFailed { slot, usage, error },
        }
    }
}
