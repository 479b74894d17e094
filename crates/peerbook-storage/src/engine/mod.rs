//! Storage engine abstraction
//!
//! The repository never talks to a database directly. It goes through
//! [`StorageEngine`], a small ordered key/value contract:
//!
//! - tables are created and dropped by migrations
//! - rows are byte keys to byte values, scanned in ascending key order
//! - uniqueness is key identity: [`WriteOp::Insert`] on an existing key
//!   fails with [`StorageError::UniqueViolation`]
//! - [`StorageEngine::insert_if_absent`] is the idempotent insert primitive
//! - a [`WriteBatch`] is applied atomically
//!
//! Two engines ship with the crate: [`InMemoryEngine`] for tests and
//! simulation, and [`RedbEngine`] for durable storage.

mod memory;
mod persistent;

pub use memory::InMemoryEngine;
pub use persistent::{RedbEngine, RedbEngineConfig};

use std::fmt::Display;

use async_trait::async_trait;

use crate::error::StorageError;

/// Type alias for scan results to simplify complex type
pub type ScanResults = Vec<(Vec<u8>, Vec<u8>)>;

/// A named table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Table(&'static str);

impl Table {
    /// Declare a table by name
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The table name
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// A single mutation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert a new row; fails the batch if the key exists
    Insert {
        table: Table,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Insert or overwrite a row
    Put {
        table: Table,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Remove one row if present
    Delete { table: Table, key: Vec<u8> },
    /// Remove every row whose key starts with `prefix`
    DeletePrefix { table: Table, prefix: Vec<u8> },
}

impl WriteOp {
    /// Table this operation targets
    pub fn table(&self) -> Table {
        match self {
            WriteOp::Insert { table, .. }
            | WriteOp::Put { table, .. }
            | WriteOp::Delete { table, .. }
            | WriteOp::DeletePrefix { table, .. } => *table,
        }
    }
}

/// An ordered list of mutations applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an insert
    pub fn insert(mut self, table: Table, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.ops.push(WriteOp::Insert {
            table,
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append an upsert
    pub fn put(mut self, table: Table, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.ops.push(WriteOp::Put {
            table,
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append a single-row delete
    pub fn delete(mut self, table: Table, key: impl Into<Vec<u8>>) -> Self {
        self.ops.push(WriteOp::Delete {
            table,
            key: key.into(),
        });
        self
    }

    /// Append a prefix delete
    pub fn delete_prefix(mut self, table: Table, prefix: impl Into<Vec<u8>>) -> Self {
        self.ops.push(WriteOp::DeletePrefix {
            table,
            prefix: prefix.into(),
        });
        self
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no operations
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterate over the operations in order
    pub fn ops(&self) -> impl Iterator<Item = &WriteOp> {
        self.ops.iter()
    }

    /// Consume the batch into its operations
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Capability-typed handle to an ordered key/value store
///
/// Implementations must be safe to share across tasks; independent reads are
/// expected to proceed concurrently.
#[async_trait]
pub trait StorageEngine: Send + Sync + 'static {
    /// Create a table if it does not exist yet
    async fn create_table(&self, table: Table) -> Result<(), StorageError>;

    /// Drop a table and all of its rows; dropping a missing table is a no-op
    async fn drop_table(&self, table: Table) -> Result<(), StorageError>;

    /// Read one row
    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Read every row whose key starts with `prefix`, in ascending key order
    async fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<ScanResults, StorageError>;

    /// Number of rows in a table
    async fn count(&self, table: Table) -> Result<usize, StorageError>;

    /// Insert a row unless the key already exists
    ///
    /// Returns `true` if the row was written, `false` if it was already
    /// present. The check and the write happen in one step.
    async fn insert_if_absent(
        &self,
        table: Table,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, StorageError>;

    /// Apply a batch atomically
    ///
    /// Returns the number of rows removed by `Delete` and `DeletePrefix`
    /// operations. If any operation fails, no operation takes effect.
    async fn write(&self, batch: WriteBatch) -> Result<usize, StorageError>;
}
