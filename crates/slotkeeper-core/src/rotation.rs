//! Retention of autosave blobs
//!
//! For one (chat, participant) pair only the newest `max_files` untagged
//! blobs are kept. Tagged blobs are manual saves: they are neither counted
//! nor deleted. Undecodable names are ignored.

use crate::error::{SlotkeeperError, SlotkeeperResult};
use crate::gateway::BlobStore;
use crate::naming::CacheBlobName;
use crate::pool::ParticipantId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a rotation pass did
#[derive(Debug, Default)]
pub struct RotationReport {
    pub kept: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<(String, SlotkeeperError)>,
}

impl RotationReport {
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct RotationPolicy {
    store: Arc<dyn BlobStore>,
    max_files: usize,
}

impl RotationPolicy {
    pub fn new(store: Arc<dyn BlobStore>, max_files: usize) -> Self {
        Self { store, max_files }
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Delete untagged blobs beyond the retention count.
    ///
    /// A failed delete is recorded and the pass continues; only a failed
    /// listing aborts.
    pub async fn rotate(
        &self,
        chat_id: &str,
        participant: &ParticipantId,
    ) -> SlotkeeperResult<RotationReport> {
        let entries = self.store.list().await?;

        let mut autosaves: Vec<CacheBlobName> = entries
            .iter()
            .filter_map(|entry| CacheBlobName::decode(&entry.name))
            .filter(|name| !name.is_tagged() && name.belongs_to(chat_id, participant.as_str()))
            .collect();
        autosaves.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| b.encode().cmp(&a.encode()))
        });

        let mut report = RotationReport {
            kept: autosaves.len().min(self.max_files),
            ..Default::default()
        };

        for stale in autosaves.iter().skip(self.max_files) {
            let name = stale.encode();
            match self.store.delete(&name).await {
                Ok(()) => {
                    debug!(blob = %name, "rotated out old cache");
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(blob = %name, error = %e, "failed to delete old cache");
                    report.failed.push((name, e));
                }
            }
        }

        if !report.is_noop() {
            info!(
                chat_id,
                participant = %participant,
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                kept = report.kept,
                "rotation finished"
            );
        }
        Ok(report)
    }
}
