//! In-memory storage engine
//!
//! Suitable for testing and simulation environments. Tables are ordered maps
//! behind a single async `RwLock`: reads share the lock, a batch takes it
//! exclusively and rolls back through an undo log if any operation fails.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::{ScanResults, StorageEngine, Table, WriteBatch, WriteOp};
use crate::error::StorageError;

type Rows = BTreeMap<Vec<u8>, Vec<u8>>;

/// Previous state of one row, restored on rollback
struct Undo {
    table: Table,
    key: Vec<u8>,
    previous: Option<Vec<u8>>,
}

/// In-memory implementation of StorageEngine
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    tables: RwLock<HashMap<Table, Rows>>,
}

impl InMemoryEngine {
    /// Create an empty engine with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the tables that currently exist
    pub async fn table_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tables.read().await.keys().map(Table::name).collect();
        names.sort_unstable();
        names
    }
}

fn rows(tables: &HashMap<Table, Rows>, table: Table) -> Result<&Rows, StorageError> {
    tables
        .get(&table)
        .ok_or_else(|| StorageError::table_missing(table.name()))
}

fn rows_mut(tables: &mut HashMap<Table, Rows>, table: Table) -> Result<&mut Rows, StorageError> {
    tables
        .get_mut(&table)
        .ok_or_else(|| StorageError::table_missing(table.name()))
}

fn prefixed_keys(rows: &Rows, prefix: &[u8]) -> Vec<Vec<u8>> {
    rows.range(prefix.to_vec()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

fn rollback(tables: &mut HashMap<Table, Rows>, undo: Vec<Undo>) {
    for entry in undo.into_iter().rev() {
        if let Some(rows) = tables.get_mut(&entry.table) {
            match entry.previous {
                Some(value) => {
                    rows.insert(entry.key, value);
                }
                None => {
                    rows.remove(&entry.key);
                }
            }
        }
    }
}

fn apply(
    tables: &mut HashMap<Table, Rows>,
    op: WriteOp,
    undo: &mut Vec<Undo>,
) -> Result<usize, StorageError> {
    match op {
        WriteOp::Insert { table, key, value } => {
            let rows = rows_mut(tables, table)?;
            if rows.contains_key(&key) {
                return Err(StorageError::unique_violation(table.name(), &key));
            }
            rows.insert(key.clone(), value);
            undo.push(Undo {
                table,
                key,
                previous: None,
            });
            Ok(0)
        }
        WriteOp::Put { table, key, value } => {
            let previous = rows_mut(tables, table)?.insert(key.clone(), value);
            undo.push(Undo {
                table,
                key,
                previous,
            });
            Ok(0)
        }
        WriteOp::Delete { table, key } => {
            match rows_mut(tables, table)?.remove(&key) {
                Some(previous) => {
                    undo.push(Undo {
                        table,
                        key,
                        previous: Some(previous),
                    });
                    Ok(1)
                }
                None => Ok(0),
            }
        }
        WriteOp::DeletePrefix { table, prefix } => {
            let rows = rows_mut(tables, table)?;
            let mut removed = 0;
            for key in prefixed_keys(rows, &prefix) {
                if let Some(previous) = rows.remove(&key) {
                    undo.push(Undo {
                        table,
                        key,
                        previous: Some(previous),
                    });
                    removed += 1;
                }
            }
            Ok(removed)
        }
    }
}

#[async_trait]
impl StorageEngine for InMemoryEngine {
    async fn create_table(&self, table: Table) -> Result<(), StorageError> {
        self.tables.write().await.entry(table).or_default();
        debug!(table = %table, "Created in-memory table");
        Ok(())
    }

    async fn drop_table(&self, table: Table) -> Result<(), StorageError> {
        if self.tables.write().await.remove(&table).is_some() {
            debug!(table = %table, "Dropped in-memory table");
        }
        Ok(())
    }

    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let tables = self.tables.read().await;
        Ok(rows(&tables, table)?.get(key).cloned())
    }

    async fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<ScanResults, StorageError> {
        let tables = self.tables.read().await;
        let rows = rows(&tables, table)?;

        Ok(rows
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn count(&self, table: Table) -> Result<usize, StorageError> {
        let tables = self.tables.read().await;
        Ok(rows(&tables, table)?.len())
    }

    async fn insert_if_absent(
        &self,
        table: Table,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let rows = rows_mut(&mut tables, table)?;

        if rows.contains_key(key) {
            trace!(table = %table, "Row already present, skipping insert");
            return Ok(false);
        }
        rows.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    async fn write(&self, batch: WriteBatch) -> Result<usize, StorageError> {
        let mut tables = self.tables.write().await;
        let mut undo = Vec::new();
        let mut removed = 0;

        for op in batch.into_ops() {
            match apply(&mut tables, op, &mut undo) {
                Ok(count) => removed += count,
                Err(e) => {
                    trace!(error = %e, rolled_back = undo.len(), "Batch failed, rolling back");
                    rollback(&mut tables, undo);
                    return Err(e);
                }
            }
        }

        Ok(removed)
    }
}
