//! Error types for peerbook core types

use thiserror::Error;

/// Errors related to peer identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid public key: {0}")]
    InvalidKey(String),
}

/// Errors related to signed peer records
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Envelope decoding failed: {0}")]
    Envelope(String),

    #[error("Invalid record payload: {0}")]
    Payload(String),

    #[error("Record signed by {signer} but claims peer {claimed}")]
    SignerMismatch { signer: String, claimed: String },

    #[error("Sequence number {0} exceeds the signed 64-bit range")]
    SequenceOutOfRange(u64),
}

/// Error returned when a protocol string is not semantically versioned
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolParseError {
    #[error("Protocol must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("Protocol has no name segment: {0}")]
    MissingName(String),

    #[error("Invalid semantic version '{version}' in {protocol}")]
    InvalidVersion { protocol: String, version: String },
}

impl From<postcard::Error> for RecordError {
    fn from(err: postcard::Error) -> Self {
        RecordError::Payload(err.to_string())
    }
}
