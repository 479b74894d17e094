//! Key book

use peerbook_core::{MetadataKey, PeerId, PeerKey};
use tracing::{debug, instrument, trace, warn};

use super::{PeerRepository, Resolution};
use crate::engine::{StorageEngine, WriteBatch};
use crate::error::StorageError;
use crate::schema::keys::{CHILD_TABLES, IDENTITIES, PEERS};
use crate::schema::{MetadataEntry, PeerEntry, encode};

impl<E: StorageEngine> PeerRepository<E> {
    /// Store a peer's key
    ///
    /// A new peer is created together with a `Discovered` timestamp. For a
    /// known peer the stored key is only replaced by one carrying more
    /// information, or when the stored material cannot be decoded.
    ///
    /// The read of the stored key and the write of its replacement are
    /// separate steps: two concurrent upgrades of the same peer may each
    /// overwrite the other.
    #[instrument(skip(self, key), fields(peer = %key))]
    pub async fn add_key(&self, key: &PeerKey) -> Result<(), StorageError> {
        match self.resolve_or_create(key).await? {
            Resolution::Created(entry) => {
                if self.config.record_discovery {
                    self.record_discovery(&entry).await;
                }
                Ok(())
            }
            Resolution::Existing(entry) => self.upgrade_key(&entry, key).await,
        }
    }

    async fn upgrade_key(&self, entry: &PeerEntry, key: &PeerKey) -> Result<(), StorageError> {
        let replace = match entry.decode_key() {
            Ok(stored) => key.carries_more_than(&stored),
            Err(e) => {
                warn!(error = %e, "Stored key material is unreadable, replacing it");
                true
            }
        };

        if !replace {
            trace!("Stored key already as complete");
            return Ok(());
        }

        let updated = entry.with_key_material(key);
        self.engine
            .write(WriteBatch::new().put(PEERS, entry.id.as_bytes().to_vec(), encode(&updated)?))
            .await?;
        debug!(full = !key.is_id_only(), "Updated key material");
        Ok(())
    }

    async fn record_discovery(&self, entry: &PeerEntry) {
        // Seconds since the epoch with microsecond precision
        let now = chrono::Utc::now();
        let discovered = format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros());
        let row = MetadataEntry::new(entry.id, MetadataKey::Discovered.as_str(), discovered);

        if let Err(e) = self.insert_child(&row).await {
            warn!(peer = %entry.peer, error = %e, "Failed to record discovery time");
        }
    }

    /// Remove a peer and everything stored for it
    #[instrument(skip(self), fields(peer = %peer))]
    pub async fn remove_key(&self, peer: &PeerId) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;

        let batch = CHILD_TABLES
            .iter()
            .fold(WriteBatch::new(), |batch, table| {
                batch.delete_prefix(*table, entry.id.as_bytes().to_vec())
            })
            .delete(PEERS, entry.id.as_bytes().to_vec())
            .delete(IDENTITIES, entry.peer.as_bytes());

        let removed = self.engine.write(batch).await?;
        debug!(removed, "Removed peer");
        Ok(())
    }

    /// Decode the stored key for a base58 identity
    pub async fn key_for(&self, identity: &str) -> Result<PeerKey, StorageError> {
        self.find_entry_by_identity(identity)
            .await?
            .ok_or_else(|| StorageError::not_found(identity))?
            .decode_key()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::PeerStoreConfig;
    use crate::engine::InMemoryEngine;

    async fn repository(config: PeerStoreConfig) -> PeerRepository<InMemoryEngine> {
        PeerRepository::open(Arc::new(InMemoryEngine::new()), config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bare_key_does_not_erase_full_key() {
        let repo = repository(PeerStoreConfig::default()).await;
        let (_, full) = PeerKey::generate_ed25519();
        let bare = PeerKey::from_peer_id(*full.peer_id());

        repo.add_key(&full).await.unwrap();
        repo.add_key(&bare).await.unwrap();

        let stored = repo.key_for(&full.to_base58()).await.unwrap();
        assert!(!stored.is_id_only());
    }

    #[tokio::test]
    async fn test_full_key_upgrades_bare_key() {
        let repo = repository(PeerStoreConfig::default()).await;
        let (_, full) = PeerKey::generate_ed25519();
        let bare = PeerKey::from_peer_id(*full.peer_id());

        repo.add_key(&bare).await.unwrap();
        assert!(repo.key_for(&bare.to_base58()).await.unwrap().is_id_only());

        repo.add_key(&full).await.unwrap();
        let stored = repo.key_for(&bare.to_base58()).await.unwrap();
        assert_eq!(stored.public_key(), full.public_key());
    }

    #[tokio::test]
    async fn test_unreadable_key_material_is_replaced() {
        let repo = repository(PeerStoreConfig::default()).await;
        let (_, full) = PeerKey::generate_ed25519();
        let (_, other) = PeerKey::generate_ed25519();
        let entry = repo.resolve_or_create(&full).await.unwrap().into_entry();

        // Corrupt the stored material with another peer's key
        let corrupted = entry.with_key_material(&other);
        repo.engine
            .write(WriteBatch::new().put(PEERS, entry.id.as_bytes().to_vec(), encode(&corrupted).unwrap()))
            .await
            .unwrap();
        assert!(repo.key_for(&full.to_base58()).await.is_err());

        repo.add_key(&PeerKey::from_peer_id(*full.peer_id())).await.unwrap();
        assert!(repo.key_for(&full.to_base58()).await.unwrap().is_id_only());
    }

    #[tokio::test]
    async fn test_discovered_recorded_once() {
        let repo = repository(PeerStoreConfig::default()).await;
        let (_, key) = PeerKey::generate_ed25519();

        repo.add_key(&key).await.unwrap();
        let first = repo.metadata(key.peer_id()).await.unwrap();
        let discovered = first.get(MetadataKey::Discovered.as_str()).cloned().unwrap();
        let text = String::from_utf8(discovered.clone()).unwrap();
        let (whole, fraction) = text.split_once('.').unwrap();
        assert!(whole.parse::<i64>().unwrap() > 0);
        assert_eq!(fraction.len(), 6);
        let seconds: f64 = text.parse().unwrap();
        assert!((seconds - chrono::Utc::now().timestamp() as f64).abs() < 60.0);

        repo.add_key(&key).await.unwrap();
        let second = repo.metadata(key.peer_id()).await.unwrap();
        assert_eq!(second.get(MetadataKey::Discovered.as_str()), Some(&discovered));
    }

    #[tokio::test]
    async fn test_discovery_can_be_disabled() {
        let config = PeerStoreConfig::builder().record_discovery(false).build();
        let repo = repository(config).await;
        let (_, key) = PeerKey::generate_ed25519();

        repo.add_key(&key).await.unwrap();
        assert!(repo.metadata(key.peer_id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_key_cascades() {
        let repo = repository(PeerStoreConfig::default()).await;
        let (_, key) = PeerKey::generate_ed25519();
        let peer = *key.peer_id();

        repo.add_key(&key).await.unwrap();
        repo.add_address(&peer, &"/ip4/10.0.0.1/tcp/1".parse().unwrap())
            .await
            .unwrap();
        repo.add_protocol(&peer, &"/chat/1.0.0".parse().unwrap())
            .await
            .unwrap();

        repo.remove_key(&peer).await.unwrap();

        assert!(repo.find_entry(&peer).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 0);
        for table in CHILD_TABLES {
            assert_eq!(repo.engine.count(table).await.unwrap(), 0);
        }
        assert!(repo.remove_key(&peer).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_key_for_unknown_identity() {
        let repo = repository(PeerStoreConfig::default()).await;
        let peer = PeerId::random();
        assert!(repo.key_for(&peer.to_base58()).await.unwrap_err().is_not_found());
    }
}
