//! Composite peer views
//!
//! A [`PeerView`] is everything stored about one peer. The four child
//! collections are fetched concurrently; a collection that fails to load is
//! reported at `warn` and shows up empty rather than failing the view.

use std::collections::{HashMap, HashSet};

use peerbook_core::{Multiaddr, PeerId, PeerKey, SemVerProtocol, SignedPeerRecord};
use tracing::warn;

use crate::engine::StorageEngine;
use crate::error::StorageError;
use crate::repository::addresses::addresses_of;
use crate::repository::metadata::metadata_of;
use crate::repository::protocols::protocols_of;
use crate::repository::records::records_of;
use crate::schema::PeerEntry;

/// Snapshot of one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerView {
    pub key: PeerKey,
    pub addresses: HashSet<Multiaddr>,
    pub protocols: HashSet<SemVerProtocol>,
    pub records: HashSet<SignedPeerRecord>,
    pub metadata: HashMap<String, Vec<u8>>,
}

impl PeerView {
    /// Identity of the peer
    pub fn peer_id(&self) -> &PeerId {
        self.key.peer_id()
    }

    /// Record with the highest sequence
    pub fn most_recent_record(&self) -> Option<&SignedPeerRecord> {
        self.records.iter().max_by_key(|r| r.sequence_number() as i64)
    }
}

/// Key and addresses of one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub key: PeerKey,
    pub addresses: Vec<Multiaddr>,
}

fn or_empty<T: Default>(peer: &str, field: &'static str, result: Result<T, StorageError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(peer, field, error = %e, "Failed to load peer field, using empty");
            T::default()
        }
    }
}

/// Assemble the full view of a peer
///
/// Fails only if the entry's own identity cannot be decoded.
pub async fn build_view<E>(engine: &E, entry: &PeerEntry) -> Result<PeerView, StorageError>
where
    E: StorageEngine + ?Sized,
{
    let key = entry.decode_key()?;

    let (addresses, protocols, records, metadata) = tokio::join!(
        addresses_of(engine, entry.id),
        protocols_of(engine, entry.id),
        records_of(engine, entry.id),
        metadata_of(engine, entry.id),
    );

    Ok(PeerView {
        key,
        addresses: or_empty(&entry.peer, "addresses", addresses)
            .into_iter()
            .collect(),
        protocols: or_empty(&entry.peer, "protocols", protocols)
            .into_iter()
            .collect(),
        records: or_empty(&entry.peer, "records", records)
            .into_iter()
            .collect(),
        metadata: or_empty(&entry.peer, "metadata", metadata),
    })
}

/// Assemble the key and addresses of a peer
pub async fn build_simple_view<E>(engine: &E, entry: &PeerEntry) -> Result<PeerInfo, StorageError>
where
    E: StorageEngine + ?Sized,
{
    Ok(PeerInfo {
        key: entry.decode_key()?,
        addresses: addresses_of(engine, entry.id).await?,
    })
}
