//! Address book

use peerbook_core::{Multiaddr, PeerId, PeerKey, parse_address, peer_id_in};
use tracing::{debug, instrument, trace};

use super::PeerRepository;
use crate::engine::{StorageEngine, WriteBatch};
use crate::error::StorageError;
use crate::schema::keys::{ADDRESSES, child_key};
use crate::schema::{AddressEntry, PeerEntry, StoreId, load_children};
use crate::view::{PeerInfo, build_simple_view};

/// Stored addresses of one peer; strings that no longer parse are dropped
pub(crate) async fn addresses_of<E>(engine: &E, owner: StoreId) -> Result<Vec<Multiaddr>, StorageError>
where
    E: StorageEngine + ?Sized,
{
    let rows: Vec<AddressEntry> = load_children(engine, owner).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let parsed = parse_address(&row.address);
            if parsed.is_none() {
                trace!(owner = %owner, address = %row.address, "Dropping malformed address");
            }
            parsed
        })
        .collect())
}

impl<E: StorageEngine> PeerRepository<E> {
    /// Add one address, creating the peer if needed
    pub async fn add_address(&self, peer: &PeerId, address: &Multiaddr) -> Result<(), StorageError> {
        self.add_addresses(peer, std::slice::from_ref(address)).await
    }

    /// Add several addresses, creating the peer if needed
    ///
    /// Addresses already stored for the peer are skipped. An empty list does
    /// nothing, not even create the peer.
    #[instrument(skip(self, addresses), fields(peer = %peer, count = addresses.len()))]
    pub async fn add_addresses(
        &self,
        peer: &PeerId,
        addresses: &[Multiaddr],
    ) -> Result<(), StorageError> {
        if addresses.is_empty() {
            return Ok(());
        }

        let entry = self
            .resolve_or_create(&PeerKey::from_peer_id(*peer))
            .await?
            .into_entry();

        let mut inserted = 0;
        for address in addresses {
            if self.insert_child(&AddressEntry::new(entry.id, address)).await? {
                inserted += 1;
            } else {
                trace!(address = %address, "Address already stored");
            }
        }

        debug!(inserted, "Added addresses");
        Ok(())
    }

    /// Remove one address
    pub async fn remove_address(&self, peer: &PeerId, address: &Multiaddr) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;
        let key = child_key(entry.id, address.to_string().as_bytes());

        let removed = self.engine.write(WriteBatch::new().delete(ADDRESSES, key)).await?;
        debug!(peer = %peer, address = %address, removed, "Removed address");
        Ok(())
    }

    /// Remove every address of a peer
    pub async fn remove_all_addresses(&self, peer: &PeerId) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;

        let removed = self
            .engine
            .write(WriteBatch::new().delete_prefix(ADDRESSES, entry.id.as_bytes().to_vec()))
            .await?;
        debug!(peer = %peer, removed, "Removed all addresses");
        Ok(())
    }

    /// Stored addresses of a peer
    pub async fn addresses(&self, peer: &PeerId) -> Result<Vec<Multiaddr>, StorageError> {
        let entry = self.require_entry(peer).await?;
        addresses_of(self.engine.as_ref(), entry.id).await
    }

    /// Identity embedded in an address
    ///
    /// Only the address itself is consulted; stored addresses are not
    /// searched.
    pub fn find_peer_identity(&self, address: &Multiaddr) -> Result<PeerId, StorageError> {
        peer_id_in(address).ok_or_else(|| StorageError::no_identity_in_address(address.to_string()))
    }

    /// Entry of the peer named by an address
    pub async fn find_peer_record(&self, address: &Multiaddr) -> Result<PeerEntry, StorageError> {
        let peer = self.find_peer_identity(address)?;
        self.require_entry(&peer).await
    }

    /// Stored key of the peer named by an address
    pub async fn peer_key_by_address(&self, address: &Multiaddr) -> Result<PeerKey, StorageError> {
        self.find_peer_record(address).await?.decode_key()
    }

    /// Key and addresses of the peer named by an address
    pub async fn peer_info_by_address(&self, address: &Multiaddr) -> Result<PeerInfo, StorageError> {
        let entry = self.find_peer_record(address).await?;
        build_simple_view(self.engine.as_ref(), &entry).await
    }
}
