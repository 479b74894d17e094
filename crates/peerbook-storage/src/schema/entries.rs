//! Persisted record shapes

use std::fmt::Display;

use peerbook_core::{IdentityError, Multiaddr, PeerKey, RecordError, SemVerProtocol, SignedPeerRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::keys::{self, ADDRESSES, METADATA, PROTOCOLS, RECORDS};
use crate::engine::{StorageEngine, Table};
use crate::error::StorageError;

/// Serialize a row with postcard
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(value).map_err(|e| StorageError::serialization(e.to_string()))
}

/// Deserialize a row with postcard
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    postcard::from_bytes(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
}

/// Store-internal identifier of a peer entry
///
/// Independent of the peer's cryptographic identity; child rows reference
/// their owner through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(Uuid);

impl StoreId {
    /// Length of the byte encoding
    pub const LEN: usize = 16;

    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The 16-byte encoding used in row keys
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Decode from the 16-byte encoding
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StorageError> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|e| StorageError::deserialization(format!("store id: {e}")))
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A known peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub id: StoreId,
    /// Base58 peer identity
    pub peer: String,
    /// Protobuf-encoded public key, when more than the bare identity is known
    pub key_material: Option<Vec<u8>>,
}

impl PeerEntry {
    /// Create a new entry for a key
    pub fn new(key: &PeerKey) -> Self {
        Self {
            id: StoreId::new(),
            peer: key.to_base58(),
            key_material: key.marshal_public_key(),
        }
    }

    /// Whether the stored key carries a public key
    pub fn has_key_material(&self) -> bool {
        self.key_material.is_some()
    }

    /// Decode the stored identity
    ///
    /// Key material that decodes to a different peer than `peer` is rejected.
    pub fn decode_key(&self) -> Result<PeerKey, StorageError> {
        let bare = PeerKey::from_base58(&self.peer)?;

        let Some(material) = &self.key_material else {
            return Ok(bare);
        };

        let full = PeerKey::from_marshaled_public_key(material)?;
        if full != bare {
            return Err(IdentityError::InvalidKey(format!(
                "key material for {} belongs to {}",
                self.peer, full
            ))
            .into());
        }
        Ok(full)
    }

    /// Copy of this entry carrying `key`'s material
    pub fn with_key_material(&self, key: &PeerKey) -> Self {
        Self {
            key_material: key.marshal_public_key(),
            ..self.clone()
        }
    }
}

/// A row owned by a [`PeerEntry`]
pub trait ChildEntry: Serialize + DeserializeOwned + Send {
    /// Table the rows live in
    const TABLE: Table;

    /// Owning peer entry
    fn owner(&self) -> StoreId;

    /// Bytes of the column that is unique per owner
    fn column(&self) -> Vec<u8>;

    /// Full row key
    fn row_key(&self) -> Vec<u8> {
        keys::child_key(self.owner(), &self.column())
    }
}

/// Load every child row of one peer, in key order
pub async fn load_children<T, E>(engine: &E, owner: StoreId) -> Result<Vec<T>, StorageError>
where
    T: ChildEntry,
    E: StorageEngine + ?Sized,
{
    engine
        .scan_prefix(T::TABLE, owner.as_bytes())
        .await?
        .iter()
        .map(|(_, value)| decode(value))
        .collect()
}

/// A multiaddress of a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub id: StoreId,
    pub owner: StoreId,
    pub address: String,
}

impl AddressEntry {
    pub fn new(owner: StoreId, address: &Multiaddr) -> Self {
        Self {
            id: StoreId::new(),
            owner,
            address: address.to_string(),
        }
    }
}

impl ChildEntry for AddressEntry {
    const TABLE: Table = ADDRESSES;

    fn owner(&self) -> StoreId {
        self.owner
    }

    fn column(&self) -> Vec<u8> {
        self.address.as_bytes().to_vec()
    }
}

/// A protocol a peer supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    pub id: StoreId,
    pub owner: StoreId,
    pub protocol: String,
}

impl ProtocolEntry {
    pub fn new(owner: StoreId, protocol: &SemVerProtocol) -> Self {
        Self {
            id: StoreId::new(),
            owner,
            protocol: protocol.string_value(),
        }
    }
}

impl ChildEntry for ProtocolEntry {
    const TABLE: Table = PROTOCOLS;

    fn owner(&self) -> StoreId {
        self.owner
    }

    fn column(&self) -> Vec<u8> {
        self.protocol.as_bytes().to_vec()
    }
}

/// A signed peer record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub id: StoreId,
    pub owner: StoreId,
    /// The record's sequence number, never negative
    pub sequence: i64,
    /// Marshaled signed envelope
    pub record: Vec<u8>,
}

impl RecordEntry {
    pub fn new(owner: StoreId, record: &SignedPeerRecord) -> Result<Self, StorageError> {
        let seq = record.sequence_number();
        let sequence = i64::try_from(seq).map_err(|_| RecordError::SequenceOutOfRange(seq))?;

        Ok(Self {
            id: StoreId::new(),
            owner,
            sequence,
            record: record.marshal(),
        })
    }

    /// Sequence number as carried by the record
    pub fn sequence_number(&self) -> u64 {
        self.sequence.unsigned_abs()
    }

    /// Decode and verify the stored envelope
    pub fn decode_record(&self) -> Result<SignedPeerRecord, StorageError> {
        Ok(SignedPeerRecord::from_marshaled(&self.record)?)
    }
}

impl ChildEntry for RecordEntry {
    const TABLE: Table = RECORDS;

    fn owner(&self) -> StoreId {
        self.owner
    }

    fn column(&self) -> Vec<u8> {
        keys::sequence_column(self.sequence).to_vec()
    }
}

/// A free-form metadata value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub id: StoreId,
    pub owner: StoreId,
    pub key: String,
    pub value: Vec<u8>,
}

impl MetadataEntry {
    pub fn new(owner: StoreId, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id: StoreId::new(),
            owner,
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ChildEntry for MetadataEntry {
    const TABLE: Table = METADATA;

    fn owner(&self) -> StoreId {
        self.owner
    }

    fn column(&self) -> Vec<u8> {
        self.key.as_bytes().to_vec()
    }
}
