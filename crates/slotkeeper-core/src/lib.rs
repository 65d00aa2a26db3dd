//! Slotkeeper Core Library
//!
//! Keeps a fixed pool of inference-server slots mapped to chat participants,
//! persists each slot's KV cache to named blobs, rotates old blobs, and
//! coordinates autosave, batch preload and heartbeat around host events.

pub mod activity;
pub mod autosave;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod heartbeat;
pub mod lifecycle;
pub mod manager;
pub mod naming;
pub mod notify;
pub mod pool;
pub mod preload;
pub mod rotation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use activity::ActivityState;
pub use autosave::{AutosaveOutcome, AutosaveScheduler};
pub use config::{ConfigLoader, SlotkeeperConfig};
pub use engine::{GenerationEngine, GenerationOutput, GenerationRequest, LlamaCompletionEngine};
pub use error::{ErrorKind, SlotkeeperError, SlotkeeperResult};
pub use gateway::{BlobEntry, BlobStore, HttpBlobStore, HttpSlotBackend, SlotBackend, SlotStatus};
pub use heartbeat::{HeartbeatScheduler, HeartbeatTick};
pub use lifecycle::{CacheLifecycle, ClearSummary, FlushSummary, SaveGroup, SavedCache};
pub use manager::{ChatChangeOutcome, ChatPhase, SlotManager};
pub use naming::CacheBlobName;
pub use notify::{NoticeLevel, Notifier, NoopNotifier, TracingNotifier};
pub use pool::{GenerationKind, ParticipantId, SlotPool};
pub use preload::{PreloadJob, PreloadObserver, PreloadOrchestrator, SilentObserver};
pub use rotation::{RotationPolicy, RotationReport};
