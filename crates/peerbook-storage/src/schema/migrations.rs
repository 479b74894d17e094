//! Schema migrations
//!
//! Each entity owns one migration that creates (and on revert drops) its
//! tables. Migrations only ever create tables that do not exist yet, so
//! running them against an existing store is harmless.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::keys::{ADDRESSES, IDENTITIES, METADATA, PEERS, PROTOCOLS, RECORDS};
use crate::engine::{StorageEngine, Table};
use crate::error::StorageError;

/// A named schema script
#[async_trait]
pub trait Migration: Send + Sync {
    /// Migration name, `<Entity>.Create`
    fn name(&self) -> &'static str;

    /// Tables created by this migration
    fn tables(&self) -> &'static [Table];

    /// Create the tables
    async fn prepare(&self, engine: &dyn StorageEngine) -> Result<(), StorageError> {
        for table in self.tables() {
            engine.create_table(*table).await?;
        }
        Ok(())
    }

    /// Drop the tables
    async fn revert(&self, engine: &dyn StorageEngine) -> Result<(), StorageError> {
        for table in self.tables().iter().rev() {
            engine.drop_table(*table).await?;
        }
        Ok(())
    }
}

/// Creates the peer and identity index tables
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatePeerEntries;

#[async_trait]
impl Migration for CreatePeerEntries {
    fn name(&self) -> &'static str {
        "PeerEntry.Create"
    }

    fn tables(&self) -> &'static [Table] {
        &[PEERS, IDENTITIES]
    }
}

/// Creates the multiaddress table
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateAddressEntries;

#[async_trait]
impl Migration for CreateAddressEntries {
    fn name(&self) -> &'static str {
        "AddressEntry.Create"
    }

    fn tables(&self) -> &'static [Table] {
        &[ADDRESSES]
    }
}

/// Creates the protocol table
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateProtocolEntries;

#[async_trait]
impl Migration for CreateProtocolEntries {
    fn name(&self) -> &'static str {
        "ProtocolEntry.Create"
    }

    fn tables(&self) -> &'static [Table] {
        &[PROTOCOLS]
    }
}

/// Creates the signed record table
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateRecordEntries;

#[async_trait]
impl Migration for CreateRecordEntries {
    fn name(&self) -> &'static str {
        "RecordEntry.Create"
    }

    fn tables(&self) -> &'static [Table] {
        &[RECORDS]
    }
}

/// Creates the metadata table
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateMetadataEntries;

#[async_trait]
impl Migration for CreateMetadataEntries {
    fn name(&self) -> &'static str {
        "MetadataEntry.Create"
    }

    fn tables(&self) -> &'static [Table] {
        &[METADATA]
    }
}

/// All migrations, parents before children
pub fn migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreatePeerEntries),
        Box::new(CreateAddressEntries),
        Box::new(CreateProtocolEntries),
        Box::new(CreateRecordEntries),
        Box::new(CreateMetadataEntries),
    ]
}

/// Runs migrations in order and reverts them in reverse
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(migrations())
    }
}

impl Migrator {
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        Self { migrations }
    }

    /// Names of the managed migrations, in run order
    pub fn names(&self) -> Vec<&'static str> {
        self.migrations.iter().map(|m| m.name()).collect()
    }

    /// Prepare every migration
    #[instrument(skip_all)]
    pub async fn run(&self, engine: &dyn StorageEngine) -> Result<(), StorageError> {
        for migration in &self.migrations {
            debug!(migration = migration.name(), "Preparing migration");
            migration.prepare(engine).await?;
        }
        info!(count = self.migrations.len(), "Peer store schema ready");
        Ok(())
    }

    /// Revert every migration, last first
    #[instrument(skip_all)]
    pub async fn revert(&self, engine: &dyn StorageEngine) -> Result<(), StorageError> {
        for migration in self.migrations.iter().rev() {
            debug!(migration = migration.name(), "Reverting migration");
            migration.revert(engine).await?;
        }
        info!(count = self.migrations.len(), "Peer store schema reverted");
        Ok(())
    }
}
