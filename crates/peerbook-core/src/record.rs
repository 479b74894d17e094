//! Signed peer records
//!
//! A [`SignedPeerRecord`] is a sequence-numbered statement of a peer's
//! addresses, signed by the peer's own key and wrapped in a libp2p
//! [`SignedEnvelope`]. The envelope's protobuf encoding is what gets stored;
//! decoding verifies the signature and that the signer is the peer the
//! payload names.

use libp2p::core::SignedEnvelope;
use libp2p::identity::Keypair;
use libp2p::{Multiaddr, PeerId};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::identity::PeerKey;

/// Domain separation string for record signatures
pub const RECORD_DOMAIN: &str = "libp2p-peer-record";

/// Payload type tag carried by the envelope
pub const RECORD_PAYLOAD_TYPE: &[u8] = b"/peerbook/peer-record";

/// Highest accepted sequence number; sequences are stored as signed 64-bit
pub const MAX_SEQUENCE: u64 = i64::MAX as u64;

fn check_sequence(seq: u64) -> Result<u64, RecordError> {
    if seq > MAX_SEQUENCE {
        return Err(RecordError::SequenceOutOfRange(seq));
    }
    Ok(seq)
}

/// Wire payload inside the envelope
#[derive(Debug, Serialize, Deserialize)]
struct RecordPayload {
    peer_id: Vec<u8>,
    seq: u64,
    addresses: Vec<Vec<u8>>,
}

/// A signed, sequence-numbered record of a peer's addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignedPeerRecord {
    signer: PeerKey,
    seq: u64,
    addresses: Vec<Multiaddr>,
    /// Protobuf encoding of the signed envelope
    envelope: Vec<u8>,
}

impl SignedPeerRecord {
    /// Sign a new record for the keypair's peer
    ///
    /// Fails with `SequenceOutOfRange` when `seq` exceeds [`MAX_SEQUENCE`].
    pub fn new(keypair: &Keypair, seq: u64, addresses: Vec<Multiaddr>) -> Result<Self, RecordError> {
        let seq = check_sequence(seq)?;
        let signer = PeerKey::from_keypair(keypair);
        let payload = RecordPayload {
            peer_id: signer.peer_id().to_bytes(),
            seq,
            addresses: addresses.iter().map(|a| a.to_vec()).collect(),
        };
        let payload = postcard::to_allocvec(&payload)?;

        let envelope = SignedEnvelope::new(
            keypair,
            RECORD_DOMAIN.to_string(),
            RECORD_PAYLOAD_TYPE.to_vec(),
            payload,
        )
        .map_err(|e| RecordError::Signing(e.to_string()))?;

        Ok(Self {
            signer,
            seq,
            addresses,
            envelope: envelope.into_protobuf_encoding(),
        })
    }

    /// Decode and verify a marshaled record
    pub fn from_marshaled(bytes: &[u8]) -> Result<Self, RecordError> {
        let envelope = SignedEnvelope::from_protobuf_encoding(bytes)
            .map_err(|e| RecordError::Envelope(e.to_string()))?;

        let (payload, signing_key) = envelope
            .payload_and_signing_key(RECORD_DOMAIN.to_string(), RECORD_PAYLOAD_TYPE)
            .map_err(|e| RecordError::Envelope(e.to_string()))?;

        let payload: RecordPayload = postcard::from_bytes(payload)?;
        check_sequence(payload.seq)?;
        let claimed = PeerId::from_bytes(&payload.peer_id)
            .map_err(|e| RecordError::Payload(e.to_string()))?;

        let signer = PeerKey::from_public_key(signing_key.clone());
        if *signer.peer_id() != claimed {
            return Err(RecordError::SignerMismatch {
                signer: signer.to_base58(),
                claimed: claimed.to_base58(),
            });
        }

        let addresses = payload
            .addresses
            .into_iter()
            .map(|bytes| Multiaddr::try_from(bytes).map_err(|e| RecordError::Payload(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            signer,
            seq: payload.seq,
            addresses,
            envelope: bytes.to_vec(),
        })
    }

    /// Encoded form suitable for storage
    pub fn marshal(&self) -> Vec<u8> {
        self.envelope.clone()
    }

    /// The peer this record describes
    pub fn peer_id(&self) -> &PeerId {
        self.signer.peer_id()
    }

    /// Full identity of the signer
    pub fn signer(&self) -> &PeerKey {
        &self.signer
    }

    /// Sequence number; higher is newer
    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    /// The addresses advertised by this record
    pub fn addresses(&self) -> &[Multiaddr] {
        &self.addresses
    }
}
