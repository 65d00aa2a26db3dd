//! In-memory gateways for unit tests
//!
//! `FakeSlotBackend` writes into a shared `FakeBlobStore` on save, so the
//! lifecycle's size check and rotation see what the backend produced.

use crate::error::{SlotkeeperError, SlotkeeperResult};
use crate::gateway::{BlobEntry, BlobStore, SlotBackend, SlotStatus, SlotTransfer};
use crate::pool::{ParticipantId, SharedSlotPool};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct FakeBlobStore {
    files: Mutex<BTreeMap<String, u64>>,
    failing_deletes: Mutex<HashSet<String>>,
    listing_fails: Mutex<bool>,
    pub deletes: Mutex<Vec<String>>,
}

impl FakeBlobStore {
    pub fn put(&self, name: &str, size: u64) {
        self.files.lock().insert(name.to_string(), size);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.failing_deletes.lock().insert(name.to_string());
    }

    pub fn fail_listing(&self, fail: bool) {
        *self.listing_fails.lock() = fail;
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn list(&self) -> SlotkeeperResult<Vec<BlobEntry>> {
        if *self.listing_fails.lock() {
            return Err(SlotkeeperError::backend_status("listing unavailable", 503));
        }
        Ok(self
            .files
            .lock()
            .iter()
            .map(|(name, size)| BlobEntry {
                name: name.clone(),
                size: *size,
            })
            .collect())
    }

    async fn delete(&self, name: &str) -> SlotkeeperResult<()> {
        self.deletes.lock().push(name.to_string());
        if self.failing_deletes.lock().contains(name) {
            return Err(SlotkeeperError::backend_status("delete refused", 500));
        }
        match self.files.lock().remove(name) {
            Some(_) => Ok(()),
            None => Err(SlotkeeperError::not_found_resource(name, "blob")),
        }
    }
}

/// Backend call as seen by the fake, with the pool occupant at call time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Save {
        slot: usize,
        filename: String,
        occupant: Option<ParticipantId>,
    },
    Restore {
        slot: usize,
        filename: String,
    },
    Erase {
        slot: usize,
    },
}

pub struct FakeSlotBackend {
    store: Arc<FakeBlobStore>,
    pool: Mutex<Option<SharedSlotPool>>,
    slot_count: Mutex<usize>,
    processing: Mutex<HashSet<usize>>,
    blob_size: Mutex<u64>,
    save_delay: Mutex<Duration>,
    next_save_error: Mutex<Option<SlotkeeperError>>,
    restore_error: Mutex<Option<SlotkeeperError>>,
    failing_erases: Mutex<HashMap<usize, SlotkeeperError>>,
    slots_error: Mutex<Option<SlotkeeperError>>,
    pub calls: Mutex<Vec<BackendCall>>,
}

impl FakeSlotBackend {
    pub fn new(store: Arc<FakeBlobStore>, slot_count: usize) -> Self {
        Self {
            store,
            pool: Mutex::new(None),
            slot_count: Mutex::new(slot_count),
            processing: Mutex::new(HashSet::new()),
            blob_size: Mutex::new(4 * 1024 * 1024),
            save_delay: Mutex::new(Duration::ZERO),
            next_save_error: Mutex::new(None),
            restore_error: Mutex::new(None),
            failing_erases: Mutex::new(HashMap::new()),
            slots_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Record the pool occupant of each saved slot
    pub fn observe_pool(&self, pool: SharedSlotPool) {
        *self.pool.lock() = Some(pool);
    }

    pub fn set_blob_size(&self, size: u64) {
        *self.blob_size.lock() = size;
    }

    /// Time a save takes after the occupant is recorded
    pub fn set_save_delay(&self, delay: Duration) {
        *self.save_delay.lock() = delay;
    }

    pub fn set_processing(&self, slot: usize, busy: bool) {
        let mut processing = self.processing.lock();
        if busy {
            processing.insert(slot);
        } else {
            processing.remove(&slot);
        }
    }

    pub fn fail_next_save(&self, error: SlotkeeperError) {
        *self.next_save_error.lock() = Some(error);
    }

    pub fn fail_restores(&self, error: Option<SlotkeeperError>) {
        *self.restore_error.lock() = error;
    }

    pub fn fail_erase_of(&self, slot: usize, error: SlotkeeperError) {
        self.failing_erases.lock().insert(slot, error);
    }

    pub fn fail_slots(&self, error: Option<SlotkeeperError>) {
        *self.slots_error.lock() = error;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn saves(&self) -> Vec<(usize, String, Option<ParticipantId>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Save {
                    slot,
                    filename,
                    occupant,
                } => Some((slot, filename, occupant)),
                _ => None,
            })
            .collect()
    }

    pub fn restores(&self) -> Vec<(usize, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Restore { slot, filename } => Some((slot, filename)),
                _ => None,
            })
            .collect()
    }

    pub fn erases(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Erase { slot } => Some(slot),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SlotBackend for FakeSlotBackend {
    async fn slots(&self) -> SlotkeeperResult<Vec<SlotStatus>> {
        if let Some(error) = self.slots_error.lock().clone() {
            return Err(error);
        }
        let processing = self.processing.lock();
        Ok((0..*self.slot_count.lock())
            .map(|id| SlotStatus {
                id,
                is_processing: processing.contains(&id),
            })
            .collect())
    }

    async fn save(&self, slot: usize, filename: &str) -> SlotkeeperResult<SlotTransfer> {
        let occupant = self
            .pool
            .lock()
            .as_ref()
            .and_then(|pool| pool.lock().slot(slot).and_then(|s| s.occupant().cloned()));
        self.calls.lock().push(BackendCall::Save {
            slot,
            filename: filename.to_string(),
            occupant,
        });
        let delay = *self.save_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.next_save_error.lock().take() {
            return Err(error);
        }
        let size = *self.blob_size.lock();
        self.store.put(filename, size);
        Ok(SlotTransfer {
            tokens: Some(1024),
            bytes: Some(size),
            elapsed_ms: Some(12.0),
        })
    }

    async fn restore(&self, slot: usize, filename: &str) -> SlotkeeperResult<SlotTransfer> {
        self.calls.lock().push(BackendCall::Restore {
            slot,
            filename: filename.to_string(),
        });
        if let Some(error) = self.restore_error.lock().clone() {
            return Err(error);
        }
        if !self.store.contains(filename) {
            return Err(SlotkeeperError::not_found_resource(
                format!("failed to open {}", filename),
                "blob",
            ));
        }
        Ok(SlotTransfer {
            tokens: Some(1024),
            bytes: None,
            elapsed_ms: Some(8.0),
        })
    }

    async fn erase(&self, slot: usize) -> SlotkeeperResult<()> {
        self.calls.lock().push(BackendCall::Erase { slot });
        match self.failing_erases.lock().get(&slot) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
