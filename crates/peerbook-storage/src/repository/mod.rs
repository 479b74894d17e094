//! Peer repository
//!
//! All peer-keyed reads and writes. Each book (addresses, keys, protocols,
//! records, metadata) lives in its own module as an `impl` block on
//! [`PeerRepository`]; store-wide operations live in [`utilities`].
//!
//! # Lazy creation
//!
//! Adding an address, protocol, record or key for an unseen peer creates its
//! [`PeerEntry`]. Reads never create entries. Metadata can only be attached
//! to a peer that already exists.
//!
//! # Duplicates
//!
//! Address and protocol rows go through
//! [`StorageEngine::insert_if_absent`], so repeating an add is a no-op.
//! Records and metadata use a plain insert and surface
//! [`StorageError::UniqueViolation`].

pub(crate) mod addresses;
mod keys;
pub(crate) mod metadata;
pub(crate) mod protocols;
pub(crate) mod records;
pub mod utilities;

use std::sync::Arc;

use peerbook_core::{PeerId, PeerKey};
use tracing::{debug, instrument, trace};

use crate::config::PeerStoreConfig;
use crate::engine::{StorageEngine, WriteBatch};
use crate::error::StorageError;
use crate::schema::keys::{IDENTITIES, PEERS};
use crate::schema::{ChildEntry, Migrator, PeerEntry, StoreId, decode, encode};

pub use utilities::TrimSummary;

/// Outcome of resolving a peer for a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The peer was already stored
    Existing(PeerEntry),
    /// The peer was created by this call
    Created(PeerEntry),
}

impl Resolution {
    /// The resolved entry
    pub fn entry(&self) -> &PeerEntry {
        match self {
            Resolution::Existing(entry) | Resolution::Created(entry) => entry,
        }
    }

    /// Consume into the resolved entry
    pub fn into_entry(self) -> PeerEntry {
        match self {
            Resolution::Existing(entry) | Resolution::Created(entry) => entry,
        }
    }

    /// Whether this call created the entry
    pub fn was_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

/// Peer store over a storage engine
pub struct PeerRepository<E: StorageEngine> {
    engine: Arc<E>,
    config: PeerStoreConfig,
}

impl<E: StorageEngine> Clone for PeerRepository<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: self.config.clone(),
        }
    }
}

impl<E: StorageEngine> std::fmt::Debug for PeerRepository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRepository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: StorageEngine> PeerRepository<E> {
    /// Wrap an engine whose schema is already in place
    pub fn new(engine: Arc<E>, config: PeerStoreConfig) -> Self {
        Self { engine, config }
    }

    /// Run the migrations and wrap the engine
    #[instrument(skip_all)]
    pub async fn open(engine: Arc<E>, config: PeerStoreConfig) -> Result<Self, StorageError> {
        Migrator::default().run(engine.as_ref()).await?;
        Ok(Self::new(engine, config))
    }

    /// The underlying engine
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The active configuration
    pub fn config(&self) -> &PeerStoreConfig {
        &self.config
    }

    /// Look up a peer's entry
    pub async fn find_entry(&self, peer: &PeerId) -> Result<Option<PeerEntry>, StorageError> {
        self.find_entry_by_identity(&peer.to_base58()).await
    }

    /// Look up a peer's entry, failing with `NotFound` if absent
    pub async fn require_entry(&self, peer: &PeerId) -> Result<PeerEntry, StorageError> {
        self.find_entry(peer)
            .await?
            .ok_or_else(|| StorageError::not_found(peer.to_base58()))
    }

    pub(crate) async fn find_entry_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<PeerEntry>, StorageError> {
        let Some(id) = self.engine.get(IDENTITIES, identity.as_bytes()).await? else {
            return Ok(None);
        };
        let id = StoreId::from_slice(&id)?;

        match self.engine.get(PEERS, id.as_bytes()).await? {
            Some(row) => Ok(Some(decode(&row)?)),
            None => {
                trace!(peer = identity, id = %id, "Identity index points at a missing entry");
                Ok(None)
            }
        }
    }

    /// Find the peer's entry, creating it if absent
    ///
    /// The identity index row and the entry are written in one batch. If a
    /// concurrent caller creates the same peer first, the insert collides on
    /// the identity index and the winner's entry is returned instead.
    pub async fn resolve_or_create(&self, key: &PeerKey) -> Result<Resolution, StorageError> {
        if let Some(entry) = self.find_entry(key.peer_id()).await? {
            return Ok(Resolution::Existing(entry));
        }

        let entry = PeerEntry::new(key);
        let batch = WriteBatch::new()
            .insert(IDENTITIES, entry.peer.as_bytes(), entry.id.as_bytes().to_vec())
            .insert(PEERS, entry.id.as_bytes().to_vec(), encode(&entry)?);

        match self.engine.write(batch).await {
            Ok(_) => {
                debug!(peer = %entry.peer, id = %entry.id, "Created peer entry");
                Ok(Resolution::Created(entry))
            }
            Err(e) if e.is_unique_violation() => {
                trace!(peer = %entry.peer, "Lost creation race, using existing entry");
                self.require_entry(key.peer_id())
                    .await
                    .map(Resolution::Existing)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert a child row unless it already exists
    pub(crate) async fn insert_child<T: ChildEntry>(&self, row: &T) -> Result<bool, StorageError> {
        self.engine
            .insert_if_absent(T::TABLE, &row.row_key(), &encode(row)?)
            .await
    }

    /// Insert a child row, failing on a duplicate
    pub(crate) async fn insert_child_strict<T: ChildEntry>(&self, row: &T) -> Result<(), StorageError> {
        let batch = WriteBatch::new().insert(T::TABLE, row.row_key(), encode(row)?);
        self.engine.write(batch).await?;
        Ok(())
    }
}
