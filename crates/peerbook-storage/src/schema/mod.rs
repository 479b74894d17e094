//! Peer store schema
//!
//! Five record shapes, all keyed by an opaque [`StoreId`]:
//!
//! | Entity | Table | Unique column |
//! |--------|-------|---------------|
//! | [`PeerEntry`] | `peerstore` (+ `peerstore_identities`) | peer identity |
//! | [`AddressEntry`] | `peerstore_multiaddrs` | (owner, address) |
//! | [`ProtocolEntry`] | `peerstore_protocols` | (owner, protocol) |
//! | [`RecordEntry`] | `peerstore_records` | (owner, sequence) |
//! | [`MetadataEntry`] | `peerstore_metadata` | (owner, key) |
//!
//! Child rows are keyed `owner ++ column`, so a unique constraint is key
//! identity and every child of a peer is one prefix scan away.

mod entries;
pub mod keys;
mod migrations;

pub use entries::{
    AddressEntry, ChildEntry, MetadataEntry, PeerEntry, ProtocolEntry, RecordEntry, StoreId,
    decode, encode, load_children,
};
pub use migrations::{
    CreateAddressEntries, CreateMetadataEntries, CreatePeerEntries, CreateProtocolEntries,
    CreateRecordEntries, Migration, Migrator, migrations,
};
