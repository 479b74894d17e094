//! Peer identity
//!
//! A [`PeerKey`] is a peer's [`PeerId`] together with its public key when one
//! is known. A key without a public key is a *bare* identity: it names the
//! peer but cannot verify anything it signs.

use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use libp2p::PeerId;
use libp2p::identity::{Keypair, PublicKey};

use crate::error::IdentityError;

/// A peer identity, optionally carrying the peer's public key
#[derive(Clone)]
pub struct PeerKey {
    peer_id: PeerId,
    public_key: Option<PublicKey>,
}

impl PeerKey {
    /// Create a full identity from a public key
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Self {
            peer_id: public_key.to_peer_id(),
            public_key: Some(public_key),
        }
    }

    /// Create a full identity from a keypair
    pub fn from_keypair(keypair: &Keypair) -> Self {
        Self::from_public_key(keypair.public())
    }

    /// Create a bare identity that only knows the peer id
    pub fn from_peer_id(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            public_key: None,
        }
    }

    /// Generate a fresh ed25519 keypair and its identity
    pub fn generate_ed25519() -> (Keypair, Self) {
        let keypair = Keypair::generate_ed25519();
        let key = Self::from_keypair(&keypair);
        (keypair, key)
    }

    /// Parse a bare identity from its base58 form
    pub fn from_base58(s: &str) -> Result<Self, IdentityError> {
        let peer_id = PeerId::from_str(s)
            .map_err(|e| IdentityError::InvalidFormat(format!("{s}: {e}")))?;
        Ok(Self::from_peer_id(peer_id))
    }

    /// Decode a full identity from a protobuf-encoded public key
    pub fn from_marshaled_public_key(bytes: &[u8]) -> Result<Self, IdentityError> {
        let public_key = PublicKey::try_decode_protobuf(bytes)
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
        Ok(Self::from_public_key(public_key))
    }

    /// The peer id
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// The public key, if known
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// Whether only the peer id is known
    pub fn is_id_only(&self) -> bool {
        self.public_key.is_none()
    }

    /// Base58 form of the peer id
    pub fn to_base58(&self) -> String {
        self.peer_id.to_base58()
    }

    /// Protobuf encoding of the public key, if known
    pub fn marshal_public_key(&self) -> Option<Vec<u8>> {
        self.public_key.as_ref().map(PublicKey::encode_protobuf)
    }

    /// Whether this identity carries strictly more information than `other`
    ///
    /// Only a full identity carries more than a bare one; two full or two
    /// bare identities are equivalent.
    pub fn carries_more_than(&self, other: &PeerKey) -> bool {
        !self.is_id_only() && other.is_id_only()
    }
}

impl From<PeerId> for PeerKey {
    fn from(peer_id: PeerId) -> Self {
        Self::from_peer_id(peer_id)
    }
}

impl PartialEq for PeerKey {
    fn eq(&self, other: &Self) -> bool {
        self.peer_id == other.peer_id
    }
}

impl Eq for PeerKey {}

impl Hash for PeerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.peer_id.hash(state);
    }
}

impl Debug for PeerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerKey")
            .field("peer_id", &self.peer_id.to_base58())
            .field("id_only", &self.is_id_only())
            .finish()
    }
}

impl Display for PeerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.peer_id)
    }
}
