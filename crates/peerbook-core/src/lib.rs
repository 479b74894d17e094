//! # Peerbook Core
//!
//! Core identity, addressing, protocol and record types for the peerbook
//! peer store.
//!
//! The storage layer treats these as opaque values: a [`PeerKey`] is a
//! string-encodable identity, a multiaddress may embed one, and a
//! [`SignedPeerRecord`] is a signed, sequence-numbered, marshalable blob.
//!
//! ## Key Types
//!
//! - [`PeerKey`]: Peer id plus optional public key
//! - [`SemVerProtocol`]: Protocol identifier with a semantic version
//! - [`SignedPeerRecord`]: Signed statement of a peer's addresses
//! - [`MetadataKey`]: Well-known metadata keys

pub mod address;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod protocol;
pub mod record;

pub use address::{parse_address, peer_id_in};
pub use error::{IdentityError, ProtocolParseError, RecordError};
pub use identity::PeerKey;
pub use metadata::MetadataKey;
pub use protocol::{SemVer, SemVerProtocol};
pub use record::{MAX_SEQUENCE, SignedPeerRecord};

// Re-export the libp2p types that appear in our public API
pub use libp2p::identity::{Keypair, PublicKey};
pub use libp2p::{Multiaddr, PeerId};
