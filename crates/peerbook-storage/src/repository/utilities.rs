//! Store-wide operations
//!
//! Everything here walks the whole peer table in one go. None of it is
//! paged, so on large stores these calls are expensive.

use peerbook_core::PeerId;
use tracing::{info, instrument, warn};

use super::PeerRepository;
use crate::engine::{StorageEngine, WriteBatch};
use crate::error::StorageError;
use crate::schema::keys::{ALL_TABLES, PEERS};
use crate::schema::{PeerEntry, decode};
use crate::view::{PeerView, build_view};

/// Outcome of a retention sweep over every peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimSummary {
    /// Peers looked at
    pub peers_visited: usize,
    /// Peers that had records removed
    pub peers_trimmed: usize,
    /// Records removed in total
    pub records_removed: usize,
    /// Peers whose trim failed
    pub peers_skipped: usize,
}

impl<E: StorageEngine> PeerRepository<E> {
    /// Number of stored peers
    pub async fn count(&self) -> Result<usize, StorageError> {
        self.engine.count(PEERS).await
    }

    async fn entries(&self) -> Result<Vec<PeerEntry>, StorageError> {
        self.engine
            .scan_prefix(PEERS, &[])
            .await?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    /// Views of every stored peer
    pub async fn all(&self) -> Result<Vec<PeerView>, StorageError> {
        let entries = self.entries().await?;

        let mut views = Vec::with_capacity(entries.len());
        for entry in &entries {
            views.push(build_view(self.engine.as_ref(), entry).await?);
        }
        Ok(views)
    }

    /// Remove every peer and everything stored for them
    #[instrument(skip(self))]
    pub async fn remove_all_keys(&self) -> Result<(), StorageError> {
        let batch = ALL_TABLES
            .iter()
            .fold(WriteBatch::new(), |batch, table| batch.delete_prefix(*table, Vec::new()));

        let removed = self.engine.write(batch).await?;
        info!(removed, "Wiped peer store");
        Ok(())
    }

    /// Apply the retention cap to every peer
    ///
    /// A peer whose trim fails is logged and counted as skipped; the sweep
    /// carries on with the rest.
    #[instrument(skip(self))]
    pub async fn trim_all_records(&self) -> Result<TrimSummary, StorageError> {
        let mut summary = TrimSummary::default();

        for (_, value) in self.engine.scan_prefix(PEERS, &[]).await? {
            summary.peers_visited += 1;

            let entry: PeerEntry = match decode(&value) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable peer entry");
                    summary.peers_skipped += 1;
                    continue;
                }
            };

            match self.trim_owner(entry.id).await {
                Ok(0) => {}
                Ok(removed) => {
                    summary.peers_trimmed += 1;
                    summary.records_removed += removed;
                }
                Err(e) => {
                    warn!(peer = %entry.peer, error = %e, "Failed to trim records");
                    summary.peers_skipped += 1;
                }
            }
        }

        info!(
            visited = summary.peers_visited,
            trimmed = summary.peers_trimmed,
            removed = summary.records_removed,
            skipped = summary.peers_skipped,
            "Trimmed records"
        );
        Ok(summary)
    }

    /// Log the view of one peer at `info`
    pub async fn dump(&self, peer: &PeerId) -> Result<PeerView, StorageError> {
        let entry = self.require_entry(peer).await?;
        let view = build_view(self.engine.as_ref(), &entry).await?;
        log_view(&view);
        Ok(view)
    }

    /// Log the view of every peer at `info`
    ///
    /// Returns the number of peers dumped.
    pub async fn dump_all(&self) -> Result<usize, StorageError> {
        let views = self.all().await?;
        for view in &views {
            log_view(view);
        }
        info!(peers = views.len(), "Dumped peer store");
        Ok(views.len())
    }
}

fn log_view(view: &PeerView) {
    let mut records: Vec<_> = view.records.iter().map(|r| r.sequence_number()).collect();
    records.sort_unstable();
    let metadata: Vec<_> = view.metadata.keys().collect();

    info!(
        peer = %view.key,
        public_key = !view.key.is_id_only(),
        addresses = ?view.addresses,
        protocols = ?view.protocols.iter().map(ToString::to_string).collect::<Vec<_>>(),
        records = ?records,
        metadata = ?metadata,
        "Peer"
    );
}
