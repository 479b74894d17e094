//! Protocol book

use peerbook_core::{PeerId, PeerKey, SemVerProtocol};
use tracing::{debug, instrument, trace, warn};

use super::PeerRepository;
use crate::engine::{StorageEngine, WriteBatch};
use crate::error::StorageError;
use crate::schema::keys::{PEERS, PROTOCOLS, child_key};
use crate::schema::{PeerEntry, ProtocolEntry, StoreId, decode, load_children};

/// Stored protocols of one peer; strings that no longer parse are dropped
pub(crate) async fn protocols_of<E>(
    engine: &E,
    owner: StoreId,
) -> Result<Vec<SemVerProtocol>, StorageError>
where
    E: StorageEngine + ?Sized,
{
    let rows: Vec<ProtocolEntry> = load_children(engine, owner).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match row.protocol.parse::<SemVerProtocol>() {
            Ok(protocol) => Some(protocol),
            Err(e) => {
                trace!(owner = %owner, protocol = %row.protocol, error = %e, "Dropping malformed protocol");
                None
            }
        })
        .collect())
}

impl<E: StorageEngine> PeerRepository<E> {
    /// Add one protocol, creating the peer if needed
    pub async fn add_protocol(&self, peer: &PeerId, protocol: &SemVerProtocol) -> Result<(), StorageError> {
        self.add_protocols(peer, std::slice::from_ref(protocol)).await
    }

    /// Add several protocols, creating the peer if needed
    #[instrument(skip(self, protocols), fields(peer = %peer, count = protocols.len()))]
    pub async fn add_protocols(
        &self,
        peer: &PeerId,
        protocols: &[SemVerProtocol],
    ) -> Result<(), StorageError> {
        if protocols.is_empty() {
            return Ok(());
        }

        let entry = self
            .resolve_or_create(&PeerKey::from_peer_id(*peer))
            .await?
            .into_entry();

        let mut inserted = 0;
        for protocol in protocols {
            if self.insert_child(&ProtocolEntry::new(entry.id, protocol)).await? {
                inserted += 1;
            } else {
                trace!(protocol = %protocol, "Protocol already stored");
            }
        }

        debug!(inserted, "Added protocols");
        Ok(())
    }

    /// Remove one protocol
    pub async fn remove_protocol(&self, peer: &PeerId, protocol: &SemVerProtocol) -> Result<(), StorageError> {
        self.remove_protocols(peer, std::slice::from_ref(protocol)).await
    }

    /// Remove several protocols in one batch
    pub async fn remove_protocols(
        &self,
        peer: &PeerId,
        protocols: &[SemVerProtocol],
    ) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;

        let batch = protocols.iter().fold(WriteBatch::new(), |batch, protocol| {
            batch.delete(PROTOCOLS, child_key(entry.id, protocol.string_value().as_bytes()))
        });
        if batch.is_empty() {
            return Ok(());
        }

        let removed = self.engine.write(batch).await?;
        debug!(peer = %peer, removed, "Removed protocols");
        Ok(())
    }

    /// Remove every protocol of a peer
    pub async fn remove_all_protocols(&self, peer: &PeerId) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;

        let removed = self
            .engine
            .write(WriteBatch::new().delete_prefix(PROTOCOLS, entry.id.as_bytes().to_vec()))
            .await?;
        debug!(peer = %peer, removed, "Removed all protocols");
        Ok(())
    }

    /// Stored protocols of a peer
    pub async fn protocols(&self, peer: &PeerId) -> Result<Vec<SemVerProtocol>, StorageError> {
        let entry = self.require_entry(peer).await?;
        protocols_of(self.engine.as_ref(), entry.id).await
    }

    async fn entries_supporting(&self, protocol: &SemVerProtocol) -> Result<Vec<PeerEntry>, StorageError> {
        let wanted = protocol.string_value();
        let mut entries = Vec::new();

        for (_, value) in self.engine.scan_prefix(PROTOCOLS, &[]).await? {
            let row: ProtocolEntry = decode(&value)?;
            if row.protocol != wanted {
                continue;
            }

            match self.engine.get(PEERS, row.owner.as_bytes()).await? {
                Some(parent) => entries.push(decode::<PeerEntry>(&parent)?),
                None => trace!(owner = %row.owner, "Protocol row without a peer"),
            }
        }

        Ok(entries)
    }

    /// Identities of every peer that supports a protocol
    pub async fn peers_supporting(&self, protocol: &SemVerProtocol) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries_supporting(protocol)
            .await?
            .into_iter()
            .map(|entry| entry.peer)
            .collect())
    }

    /// Decoded keys of every peer that supports a protocol
    pub async fn peer_keys_supporting(
        &self,
        protocol: &SemVerProtocol,
    ) -> Result<Vec<PeerKey>, StorageError> {
        Ok(self
            .entries_supporting(protocol)
            .await?
            .into_iter()
            .filter_map(|entry| match entry.decode_key() {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(peer = %entry.peer, error = %e, "Skipping peer with unreadable key");
                    None
                }
            })
            .collect())
    }
}
