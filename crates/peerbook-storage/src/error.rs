//! Error types for peerbook-storage
//!
//! This module defines the error types used throughout the storage crate.

use peerbook_core::{IdentityError, RecordError};
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested peer (or address-derived peer) has no entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// An address-based lookup was given an address without a `/p2p/` identity
    #[error("No peer identity within address: {0}")]
    NoIdentityInAddress(String),

    /// Insert collided with an existing row on a unique key
    #[error("Unique constraint violated in {table}: {key}")]
    UniqueViolation { table: String, key: String },

    /// Table has not been created by a migration
    #[error("Table missing: {0}")]
    TableMissing(String),

    /// Error reported by the storage engine itself
    #[error("Database error: {0}")]
    Database(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Stored identity could not be decoded
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Signed record could not be built or decoded
    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new NoIdentityInAddress error
    pub fn no_identity_in_address(address: impl Into<String>) -> Self {
        Self::NoIdentityInAddress(address.into())
    }

    /// Create a new UniqueViolation error, rendering the key as hex
    pub fn unique_violation(table: impl Into<String>, key: &[u8]) -> Self {
        Self::UniqueViolation {
            table: table.into(),
            key: hex::encode(key),
        }
    }

    /// Create a new TableMissing error
    pub fn table_missing(table: impl Into<String>) -> Self {
        Self::TableMissing(table.into())
    }

    /// Create a new Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Whether this error is a uniqueness collision
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StorageError::UniqueViolation { .. })
    }

    /// Whether this error means the target does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Convert from postcard Error to StorageError
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}
