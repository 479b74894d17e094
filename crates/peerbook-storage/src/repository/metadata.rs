//! Metadata book

use std::collections::HashMap;

use peerbook_core::{MetadataKey, PeerId};
use tracing::debug;

use super::PeerRepository;
use crate::engine::{StorageEngine, WriteBatch};
use crate::error::StorageError;
use crate::schema::keys::{METADATA, child_key};
use crate::schema::{MetadataEntry, StoreId, load_children};

/// Stored metadata of one peer
pub(crate) async fn metadata_of<E>(
    engine: &E,
    owner: StoreId,
) -> Result<HashMap<String, Vec<u8>>, StorageError>
where
    E: StorageEngine + ?Sized,
{
    let rows: Vec<MetadataEntry> = load_children(engine, owner).await?;
    Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
}

impl<E: StorageEngine> PeerRepository<E> {
    /// Attach a metadata value to a known peer
    ///
    /// Keys are not overwritten: storing a key twice fails with
    /// `UniqueViolation`.
    pub async fn add_metadata(
        &self,
        peer: &PeerId,
        key: &str,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), StorageError> {
        let value = value.into();
        let entry = self.require_entry(peer).await?;
        self.insert_child_strict(&MetadataEntry::new(entry.id, key, value))
            .await?;
        debug!(peer = %peer, key, "Added metadata");
        Ok(())
    }

    /// Attach a well-known metadata value to a known peer
    pub async fn add_metadata_key(
        &self,
        peer: &PeerId,
        key: MetadataKey,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), StorageError> {
        self.add_metadata(peer, key.as_str(), value).await
    }

    /// Remove one metadata key
    pub async fn remove_metadata(&self, peer: &PeerId, key: &str) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;

        let removed = self
            .engine
            .write(WriteBatch::new().delete(METADATA, child_key(entry.id, key.as_bytes())))
            .await?;
        debug!(peer = %peer, key, removed, "Removed metadata");
        Ok(())
    }

    /// Remove every metadata key of a peer
    pub async fn remove_all_metadata(&self, peer: &PeerId) -> Result<(), StorageError> {
        let entry = self.require_entry(peer).await?;

        let removed = self
            .engine
            .write(WriteBatch::new().delete_prefix(METADATA, entry.id.as_bytes().to_vec()))
            .await?;
        debug!(peer = %peer, removed, "Removed all metadata");
        Ok(())
    }

    /// Stored metadata of a peer
    pub async fn metadata(&self, peer: &PeerId) -> Result<HashMap<String, Vec<u8>>, StorageError> {
        let entry = self.require_entry(peer).await?;
        metadata_of(self.engine.as_ref(), entry.id).await
    }
}
