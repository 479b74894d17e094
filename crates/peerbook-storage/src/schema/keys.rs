//! Table declarations and row key encodings

use crate::engine::Table;

use super::StoreId;

// Key: store id (16 bytes), Value: serialized PeerEntry
pub const PEERS: Table = Table::new("peerstore");

// Key: base58 peer identity, Value: store id (16 bytes)
pub const IDENTITIES: Table = Table::new("peerstore_identities");

// Key: (owner, address string) concatenated, Value: serialized AddressEntry
pub const ADDRESSES: Table = Table::new("peerstore_multiaddrs");

// Key: (owner, protocol string) concatenated, Value: serialized ProtocolEntry
pub const PROTOCOLS: Table = Table::new("peerstore_protocols");

// Key: (owner, sequence) concatenated, Value: serialized RecordEntry
pub const RECORDS: Table = Table::new("peerstore_records");

// Key: (owner, metadata key) concatenated, Value: serialized MetadataEntry
pub const METADATA: Table = Table::new("peerstore_metadata");

/// Child tables, in the order they are cleared when a peer is removed
pub const CHILD_TABLES: [Table; 4] = [ADDRESSES, PROTOCOLS, RECORDS, METADATA];

/// Every table the schema owns
pub const ALL_TABLES: [Table; 6] = [PEERS, IDENTITIES, ADDRESSES, PROTOCOLS, RECORDS, METADATA];

/// Key of a child row: the owner's id followed by the unique column
pub fn child_key(owner: StoreId, column: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(StoreId::LEN + column.len());
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(column);
    key
}

/// Encode a sequence so byte order matches signed integer order
pub fn sequence_column(sequence: i64) -> [u8; 8] {
    ((sequence as u64) ^ (1 << 63)).to_be_bytes()
}
