//! Record book
//!
//! Signed peer records are kept per peer up to the configured retention cap.
//! Rows sort by sequence, so the oldest records are always at the front of a
//! peer's key range.

use peerbook_core::{PeerId, SignedPeerRecord};
use tracing::{debug, instrument, trace, warn};

use super::PeerRepository;
use crate::engine::{StorageEngine, WriteBatch};
use crate::error::StorageError;
use crate::schema::keys::RECORDS;
use crate::schema::{ChildEntry, RecordEntry, StoreId, encode, load_children};

/// Decodable records of one peer, lowest sequence first
pub(crate) async fn records_of<E>(
    engine: &E,
    owner: StoreId,
) -> Result<Vec<SignedPeerRecord>, StorageError>
where
    E: StorageEngine + ?Sized,
{
    let rows: Vec<RecordEntry> = load_children(engine, owner).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match row.decode_record() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(owner = %owner, sequence = row.sequence_number(), error = %e, "Dropping unreadable record");
                None
            }
        })
        .collect())
}

impl<E: StorageEngine> PeerRepository<E> {
    /// Store a signed record
    ///
    /// An unseen signer is created with the record's public key. Storing a
    /// second record with the same sequence fails with `UniqueViolation`.
    /// For a peer that already existed the retention cap is applied
    /// afterwards.
    #[instrument(skip(self, record), fields(peer = %record.peer_id(), seq = record.sequence_number()))]
    pub async fn add_record(&self, record: &SignedPeerRecord) -> Result<(), StorageError> {
        let resolution = self.resolve_or_create(record.signer()).await?;
        let row = RecordEntry::new(resolution.entry().id, record)?;

        self.engine
            .write(WriteBatch::new().insert(RECORDS, row.row_key(), encode(&row)?))
            .await?;
        debug!("Stored signed record");

        if !resolution.was_created() {
            self.trim_owner(resolution.entry().id).await?;
        }
        Ok(())
    }

    /// Stored records of a peer, lowest sequence first
    pub async fn records(&self, peer: &PeerId) -> Result<Vec<SignedPeerRecord>, StorageError> {
        let entry = self.require_entry(peer).await?;
        records_of(self.engine.as_ref(), entry.id).await
    }

    /// The record with the highest sequence, if any
    pub async fn most_recent_record(
        &self,
        peer: &PeerId,
    ) -> Result<Option<SignedPeerRecord>, StorageError> {
        Ok(self.records(peer).await?.pop())
    }

    /// Apply the retention cap to one peer
    ///
    /// Returns the number of records removed.
    pub async fn trim_records(&self, peer: &PeerId) -> Result<usize, StorageError> {
        let entry = self.require_entry(peer).await?;
        self.trim_owner(entry.id).await
    }

    pub(crate) async fn trim_owner(&self, owner: StoreId) -> Result<usize, StorageError> {
        let mut keys: Vec<Vec<u8>> = self
            .engine
            .scan_prefix(RECORDS, owner.as_bytes())
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        keys.reverse();

        let stale = self.config.retention.records_to_remove(&keys);
        if stale.is_empty() {
            trace!(owner = %owner, stored = keys.len(), "Records within retention cap");
            return Ok(0);
        }

        let batch = stale
            .iter()
            .fold(WriteBatch::new(), |batch, key| batch.delete(RECORDS, key.as_slice()));
        let removed = self.engine.write(batch).await?;

        debug!(owner = %owner, removed, kept = keys.len() - stale.len(), "Trimmed records");
        Ok(removed)
    }

    /// Remove every record of a peer
    pub async fn remove_records(&self, peer: &PeerId) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;

        let removed = self
            .engine
            .write(WriteBatch::new().delete_prefix(RECORDS, entry.id.as_bytes().to_vec()))
            .await?;
        debug!(peer = %peer, removed, "Removed all records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use peerbook_core::{Keypair, Multiaddr};

    use super::*;
    use crate::config::PeerStoreConfig;
    use crate::engine::InMemoryEngine;

    async fn repository(config: PeerStoreConfig) -> PeerRepository<InMemoryEngine> {
        PeerRepository::open(Arc::new(InMemoryEngine::new()), config)
            .await
            .unwrap()
    }

    fn record(keypair: &Keypair, seq: u64) -> SignedPeerRecord {
        let address: Multiaddr = format!("/ip4/10.0.0.{}/tcp/4001", seq % 250).parse().unwrap();
        SignedPeerRecord::new(keypair, seq, vec![address]).unwrap()
    }

    #[tokio::test]
    async fn test_add_record_creates_signer() {
        let repo = repository(PeerStoreConfig::default()).await;
        let keypair = Keypair::generate_ed25519();
        let signed = record(&keypair, 1);

        repo.add_record(&signed).await.unwrap();

        let key = repo.key_for(&signed.peer_id().to_base58()).await.unwrap();
        assert!(!key.is_id_only());
        assert_eq!(repo.records(signed.peer_id()).await.unwrap(), vec![signed]);
    }

    #[tokio::test]
    async fn test_retention_keeps_highest_sequences() {
        let repo = repository(PeerStoreConfig::default()).await;
        let keypair = Keypair::generate_ed25519();
        let peer = keypair.public().to_peer_id();

        for seq in 1..=5 {
            repo.add_record(&record(&keypair, seq)).await.unwrap();
        }

        let seqs: Vec<_> = repo
            .records(&peer)
            .await
            .unwrap()
            .iter()
            .map(SignedPeerRecord::sequence_number)
            .collect();
        assert_eq!(seqs, vec![3, 4, 5]);

        let latest = repo.most_recent_record(&peer).await.unwrap().unwrap();
        assert_eq!(latest.sequence_number(), 5);
    }

    #[tokio::test]
    async fn test_out_of_order_insert_keeps_highest() {
        let config = PeerStoreConfig::builder().max_records_to_keep(2).build();
        let repo = repository(config).await;
        let keypair = Keypair::generate_ed25519();
        let peer = keypair.public().to_peer_id();

        for seq in [10, 30, 20, 5] {
            repo.add_record(&record(&keypair, seq)).await.unwrap();
        }

        let seqs: Vec<_> = repo
            .records(&peer)
            .await
            .unwrap()
            .iter()
            .map(SignedPeerRecord::sequence_number)
            .collect();
        assert_eq!(seqs, vec![20, 30]);
    }

    #[tokio::test]
    async fn test_highest_sequence_survives_trim() {
        let repo = repository(PeerStoreConfig::default()).await;
        let keypair = Keypair::generate_ed25519();
        let peer = keypair.public().to_peer_id();

        assert!(SignedPeerRecord::new(&keypair, 1 << 63, Vec::new()).is_err());

        repo.add_record(&record(&keypair, 1)).await.unwrap();
        repo.add_record(&record(&keypair, peerbook_core::MAX_SEQUENCE))
            .await
            .unwrap();
        let latest = repo.most_recent_record(&peer).await.unwrap().unwrap();
        assert_eq!(latest.sequence_number(), peerbook_core::MAX_SEQUENCE);

        for seq in 2..=4 {
            repo.add_record(&record(&keypair, seq)).await.unwrap();
        }

        let seqs: Vec<_> = repo
            .records(&peer)
            .await
            .unwrap()
            .iter()
            .map(SignedPeerRecord::sequence_number)
            .collect();
        assert_eq!(seqs, vec![3, 4, peerbook_core::MAX_SEQUENCE]);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_is_rejected() {
        let repo = repository(PeerStoreConfig::default()).await;
        let keypair = Keypair::generate_ed25519();

        repo.add_record(&record(&keypair, 7)).await.unwrap();
        let err = repo.add_record(&record(&keypair, 7)).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_most_recent_record_empty() {
        let repo = repository(PeerStoreConfig::default()).await;
        let peer = PeerId::random();

        repo.add_address(&peer, &"/ip4/1.1.1.1/tcp/1".parse().unwrap())
            .await
            .unwrap();
        assert!(repo.most_recent_record(&peer).await.unwrap().is_none());
        assert_eq!(repo.trim_records(&peer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_records() {
        let repo = repository(PeerStoreConfig::default()).await;
        let keypair = Keypair::generate_ed25519();
        let peer = keypair.public().to_peer_id();

        repo.add_record(&record(&keypair, 1)).await.unwrap();
        repo.add_record(&record(&keypair, 2)).await.unwrap();
        repo.remove_records(&peer).await.unwrap();

        assert!(repo.records(&peer).await.unwrap().is_empty());
        assert!(repo.find_entry(&peer).await.unwrap().is_some());
    }
}
