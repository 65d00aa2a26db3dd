//! In-memory slot pool
//!
//! Authoritative model of which participant occupies which backend slot.
//! The pool itself is synchronous; callers share it behind a mutex and never
//! hold the lock across an await. Acquisition is split into
//! [`SlotPool::plan_acquire`] and [`SlotPool::occupy`] so that an eviction
//! save can run between the two and the commit can re-validate the slot.

use crate::error::{SlotkeeperError, SlotkeeperResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Pool shared between the lifecycle, schedulers and host event handlers
pub type SharedSlotPool = Arc<Mutex<SlotPool>>;

/// Identity of a chat participant, compared on its normalized key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Surrounding whitespace is not part of the identity
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Kind of generation the host is about to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Normal,
    Quiet,
    Continue,
    Swipe,
    Regenerate,
    Impersonate,
}

/// One backend slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    occupant: Option<ParticipantId>,
    usage: u32,
    cache_loaded: bool,
    pending_generation: Option<GenerationKind>,
}

impl Slot {
    pub fn occupant(&self) -> Option<&ParticipantId> {
        self.occupant.as_ref()
    }

    /// Generations since the cache was last saved or loaded
    pub fn usage(&self) -> u32 {
        self.usage
    }

    pub fn cache_loaded(&self) -> bool {
        self.cache_loaded
    }

    pub fn pending_generation(&self) -> Option<GenerationKind> {
        self.pending_generation
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    fn clear(&mut self) {
        *self = Slot::default();
    }
}

/// Outcome of planning an acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquirePlan {
    /// The participant already holds this slot
    Resident(usize),
    /// This slot is free
    Free(usize),
    /// This slot must be evicted first
    Evict {
        index: usize,
        victim: ParticipantId,
        usage: u32,
    },
}

impl AcquirePlan {
    pub fn index(&self) -> usize {
        match self {
            Self::Resident(index) | Self::Free(index) | Self::Evict { index, .. } => *index,
        }
    }
}

/// Fixed-size arena of slots addressed by index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPool {
    slots: Vec<Slot>,
}

impl SlotPool {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![Slot::default(); size],
        }
    }

    pub fn shared(size: usize) -> SharedSlotPool {
        Arc::new(Mutex::new(Self::new(size)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Resize to the backend-reported slot count, dropping all occupancy
    pub fn reinitialize(&mut self, size: usize) {
        self.slots = vec![Slot::default(); size];
    }

    pub fn find_by_participant(&self, participant: &ParticipantId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.occupant.as_ref() == Some(participant))
    }

    /// Decide where `participant` would go, without mutating anything.
    ///
    /// Preference order: the slot it already holds, the lowest free slot, then
    /// the unprotected occupied slot with the smallest usage (lowest index on
    /// ties).
    pub fn plan_acquire(
        &self,
        participant: &ParticipantId,
        protected: &HashSet<ParticipantId>,
    ) -> SlotkeeperResult<AcquirePlan> {
        if participant.is_empty() {
            return Err(SlotkeeperError::invalid_input_field(
                "participant identity is empty",
                "participant",
            ));
        }

        if let Some(index) = self.find_by_participant(participant) {
            return Ok(AcquirePlan::Resident(index));
        }

        if let Some(index) = self.slots.iter().position(Slot::is_free) {
            return Ok(AcquirePlan::Free(index));
        }

        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.occupant
                    .as_ref()
                    .filter(|occupant| !protected.contains(*occupant))
                    .map(|occupant| (index, occupant, slot.usage))
            })
            .min_by_key(|(index, _, usage)| (*usage, *index))
            .map(|(index, victim, usage)| AcquirePlan::Evict {
                index,
                victim: victim.clone(),
                usage,
            })
            .ok_or_else(|| SlotkeeperError::no_evictable_slot(participant.as_str()))
    }

    /// Commit a plan.
    ///
    /// Fails when the slot no longer matches what the plan saw, which happens
    /// when another task changed it while the eviction save was in flight.
    /// The caller re-plans in that case.
    pub fn occupy(&mut self, plan: &AcquirePlan, participant: &ParticipantId) -> bool {
        let Some(slot) = self.slots.get(plan.index()) else {
            return false;
        };
        let still_valid = match plan {
            AcquirePlan::Resident(_) => slot.occupant.as_ref() == Some(participant),
            AcquirePlan::Free(_) => slot.is_free(),
            AcquirePlan::Evict { victim, .. } => slot.occupant.as_ref() == Some(victim),
        };
        if !still_valid {
            return false;
        }
        if matches!(plan, AcquirePlan::Resident(_)) {
            return true;
        }
        if self.find_by_participant(participant).is_some() {
            return false;
        }

        let index = plan.index();
        self.slots[index] = Slot {
            occupant: Some(participant.clone()),
            ..Slot::default()
        };
        true
    }

    /// Acquire without any eviction save, for callers that already persisted
    /// or deliberately skip persistence
    pub fn acquire_unsaved(
        &mut self,
        participant: &ParticipantId,
        protected: &HashSet<ParticipantId>,
    ) -> SlotkeeperResult<AcquirePlan> {
        let plan = self.plan_acquire(participant, protected)?;
        self.occupy(&plan, participant);
        Ok(plan)
    }

    /// Assign participants in order to slots 0..N-1 of an empty pool.
    ///
    /// Overflow participants get no slot; duplicates keep their first slot.
    pub fn assign_in_order(&mut self, participants: &[ParticipantId]) -> Vec<(usize, ParticipantId)> {
        self.reset_all();
        let mut assigned = Vec::new();
        for participant in participants {
            if participant.is_empty() || self.find_by_participant(participant).is_some() {
                continue;
            }
            let Some(index) = self.slots.iter().position(Slot::is_free) else {
                break;
            };
            self.slots[index].occupant = Some(participant.clone());
            assigned.push((index, participant.clone()));
        }
        assigned
    }

    /// Empty every slot
    pub fn reset_all(&mut self) {
        self.slots.iter_mut().for_each(Slot::clear);
    }

    /// Empty one slot
    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.clear();
        }
    }

    /// Returns the new usage, `None` for a free or unknown slot
    pub fn increment_usage(&mut self, index: usize) -> Option<u32> {
        let slot = self.slots.get_mut(index).filter(|s| !s.is_free())?;
        slot.usage = slot.usage.saturating_add(1);
        Some(slot.usage)
    }

    pub fn reset_usage(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.usage = 0;
        }
    }

    /// Take back `amount` counted messages, keeping any counted since
    pub fn consume_usage(&mut self, index: usize, amount: u32) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.usage = slot.usage.saturating_sub(amount);
        }
    }

    /// Only an occupied slot can hold a loaded cache
    pub fn set_cache_loaded(&mut self, index: usize, loaded: bool) {
        if let Some(slot) = self.slots.get_mut(index).filter(|s| !s.is_free()) {
            slot.cache_loaded = loaded;
        }
    }

    pub fn set_pending_generation(&mut self, index: usize, kind: Option<GenerationKind>) {
        if let Some(slot) = self.slots.get_mut(index).filter(|s| !s.is_free()) {
            slot.pending_generation = kind;
        }
    }

    /// Consume the one-shot generation kind recorded for the slot
    pub fn take_pending_generation(&mut self, index: usize) -> Option<GenerationKind> {
        self.slots.get_mut(index)?.pending_generation.take()
    }

    /// Whether `index` is still held by `participant`
    pub fn is_held_by(&self, index: usize, participant: &ParticipantId) -> bool {
        self.slots
            .get(index)
            .and_then(|s| s.occupant.as_ref())
            .is_some_and(|occupant| occupant == participant)
    }

    /// Occupied slots as (index, occupant, usage)
    pub fn occupied(&self) -> Vec<(usize, ParticipantId, u32)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.occupant
                    .as_ref()
                    .map(|occupant| (index, occupant.clone(), slot.usage))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> ParticipantId {
        ParticipantId::new(name)
    }

    fn none() -> HashSet<ParticipantId> {
        HashSet::new()
    }

    fn assert_no_duplicates(pool: &SlotPool) {
        let occupants: Vec<_> = pool.slots().iter().filter_map(Slot::occupant).collect();
        let unique: HashSet<_> = occupants.iter().collect();
        assert_eq!(occupants.len(), unique.len(), "duplicate occupant in {:?}", pool);
    }

    fn assert_slot_invariant(pool: &SlotPool) {
        for slot in pool.slots() {
            if slot.is_free() {
                assert_eq!(slot.usage(), 0);
                assert!(!slot.cache_loaded());
            }
        }
    }

    #[test]
    fn test_resident_participant_keeps_slot() {
        let mut pool = SlotPool::new(2);
        pool.acquire_unsaved(&p("A"), &none()).unwrap();
        pool.increment_usage(0);

        let plan = pool.acquire_unsaved(&p("A"), &none()).unwrap();
        assert_eq!(plan, AcquirePlan::Resident(0));
        assert_eq!(pool.slot(0).unwrap().usage(), 1);
    }

    #[test]
    fn test_prefers_free_slot_over_eviction() {
        let mut pool = SlotPool::new(3);
        pool.acquire_unsaved(&p("A"), &none()).unwrap();
        pool.release(0);
        pool.acquire_unsaved(&p("B"), &none()).unwrap();
        assert_eq!(pool.find_by_participant(&p("B")), Some(0));

        pool.acquire_unsaved(&p("C"), &none()).unwrap();
        let plan = pool.plan_acquire(&p("D"), &none()).unwrap();
        assert_eq!(plan, AcquirePlan::Free(2));
    }

    #[test]
    fn test_evicts_lowest_usage_then_lowest_index() {
        let mut pool = SlotPool::new(3);
        for name in ["A", "B", "C"] {
            pool.acquire_unsaved(&p(name), &none()).unwrap();
        }
        pool.increment_usage(0);
        pool.increment_usage(0);
        // B and C tie at zero; B has the lower index
        let plan = pool.plan_acquire(&p("D"), &none()).unwrap();
        assert_eq!(
            plan,
            AcquirePlan::Evict {
                index: 1,
                victim: p("B"),
                usage: 0
            }
        );
    }

    #[test]
    fn test_protected_set_is_respected() {
        let mut pool = SlotPool::new(2);
        pool.acquire_unsaved(&p("A"), &none()).unwrap();
        pool.acquire_unsaved(&p("B"), &none()).unwrap();
        pool.increment_usage(1);

        let protected: HashSet<_> = [p("A")].into_iter().collect();
        let plan = pool.plan_acquire(&p("C"), &protected).unwrap();
        assert_eq!(plan.index(), 1);

        let all: HashSet<_> = [p("A"), p("B")].into_iter().collect();
        let err = pool.plan_acquire(&p("C"), &all).unwrap_err();
        assert!(matches!(err, SlotkeeperError::NoEvictableSlot { .. }));
        assert_eq!(pool.find_by_participant(&p("C")), None);
    }

    #[test]
    fn test_eviction_resets_slot_state() {
        let mut pool = SlotPool::new(1);
        pool.acquire_unsaved(&p("A"), &none()).unwrap();
        pool.increment_usage(0);
        pool.set_cache_loaded(0, true);
        pool.set_pending_generation(0, Some(GenerationKind::Normal));

        pool.acquire_unsaved(&p("B"), &none()).unwrap();
        let slot = pool.slot(0).unwrap();
        assert_eq!(slot.occupant(), Some(&p("B")));
        assert_eq!(slot.usage(), 0);
        assert!(!slot.cache_loaded());
        assert_eq!(slot.pending_generation(), None);
    }

    #[test]
    fn test_occupy_rejects_stale_plan() {
        let mut pool = SlotPool::new(1);
        pool.acquire_unsaved(&p("A"), &none()).unwrap();
        let plan = pool.plan_acquire(&p("B"), &none()).unwrap();

        // Another task replaced A while the eviction save was in flight
        pool.release(0);
        pool.acquire_unsaved(&p("C"), &none()).unwrap();

        assert!(!pool.occupy(&plan, &p("B")));
        assert_eq!(pool.find_by_participant(&p("C")), Some(0));
    }

    #[test]
    fn test_no_duplicate_occupants_over_many_sequences() {
        let names = ["A", "B", "C", "D", "E"];
        for size in 1..=4 {
            let mut pool = SlotPool::new(size);
            for step in 0..200usize {
                let name = names[(step * 7 + step / 3) % names.len()];
                let protected: HashSet<_> = if step % 5 == 0 {
                    [p(names[step % names.len()])].into_iter().collect()
                } else {
                    HashSet::new()
                };
                if let Ok(plan) = pool.acquire_unsaved(&p(name), &protected) {
                    if step % 3 == 0 {
                        pool.increment_usage(plan.index());
                    }
                }
                if step % 11 == 0 {
                    pool.release(step % size);
                }
                assert_no_duplicates(&pool);
                assert_slot_invariant(&pool);
            }
        }
    }

    #[test]
    fn test_assign_in_order_with_overflow() {
        let mut pool = SlotPool::new(2);
        pool.acquire_unsaved(&p("Old"), &none()).unwrap();

        let assigned = pool.assign_in_order(&[p("A"), p("A"), p("B"), p("C")]);
        assert_eq!(assigned, vec![(0, p("A")), (1, p("B"))]);
        assert_eq!(pool.find_by_participant(&p("Old")), None);
        assert_eq!(pool.find_by_participant(&p("C")), None);
    }

    #[test]
    fn test_free_slot_mutators_are_noops() {
        let mut pool = SlotPool::new(1);
        assert_eq!(pool.increment_usage(0), None);
        pool.set_cache_loaded(0, true);
        assert!(!pool.slot(0).unwrap().cache_loaded());
        assert_eq!(pool.increment_usage(5), None);
    }

    #[test]
    fn test_participant_normalization() {
        assert_eq!(p("  Seraphina "), p("Seraphina"));
        assert!(p("   ").is_empty());
        let pool = SlotPool::new(1);
        assert!(pool.plan_acquire(&p(" "), &none()).is_err());
    }

    #[test]
    fn test_take_pending_generation_is_one_shot() {
        let mut pool = SlotPool::new(1);
        pool.acquire_unsaved(&p("A"), &none()).unwrap();
        pool.set_pending_generation(0, Some(GenerationKind::Quiet));
        assert_eq!(pool.take_pending_generation(0), Some(GenerationKind::Quiet));
        assert_eq!(pool.take_pending_generation(0), None);
    }
}
