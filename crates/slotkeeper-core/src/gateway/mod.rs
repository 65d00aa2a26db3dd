//! Remote gateways
//!
//! Two seams to the outside world:
//! - [`SlotBackend`]: the inference server's slot API (report, save, restore, erase)
//! - [`BlobStore`]: the file-management backend holding saved cache blobs
//!
//! Both are async traits so the lifecycle can be driven by the reqwest
//! implementations in production and by in-memory fakes in tests.

mod files_http;
mod slots_http;

pub use files_http::HttpBlobStore;
pub use slots_http::HttpSlotBackend;

use crate::error::SlotkeeperResult;
use async_trait::async_trait;

/// One slot as reported by the inference server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStatus {
    pub id: usize,
    pub is_processing: bool,
}

/// Statistics the server returns for a save or restore
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTransfer {
    pub tokens: Option<u64>,
    pub bytes: Option<u64>,
    pub elapsed_ms: Option<f64>,
}

/// A cache blob on the file backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub name: String,
    pub size: u64,
}

/// Slot operations on the inference server.
///
/// Implementations must report timeouts as `SlotkeeperError::Timeout` and
/// missing files as `SlotkeeperError::NotFound` so callers can tell them apart.
#[async_trait]
pub trait SlotBackend: Send + Sync {
    /// Occupancy and activity of every slot; the length is the slot count
    async fn slots(&self) -> SlotkeeperResult<Vec<SlotStatus>>;

    /// Persist the slot's KV cache to `filename`
    async fn save(&self, slot: usize, filename: &str) -> SlotkeeperResult<SlotTransfer>;

    /// Replace the slot's KV cache with the contents of `filename`
    async fn restore(&self, slot: usize, filename: &str) -> SlotkeeperResult<SlotTransfer>;

    /// Drop the slot's KV cache
    async fn erase(&self, slot: usize) -> SlotkeeperResult<()>;
}

/// List/delete access to saved cache blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Every cache blob (`.bin`, not a directory)
    async fn list(&self) -> SlotkeeperResult<Vec<BlobEntry>>;

    async fn delete(&self, name: &str) -> SlotkeeperResult<()>;

    /// Size of one blob, `None` when it is not listed
    async fn size_of(&self, name: &str) -> SlotkeeperResult<Option<u64>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.size))
    }
}
