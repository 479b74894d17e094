//! redb-backed storage engine
//!
//! Every logical table maps to a redb table of `&[u8] -> &[u8]`. A catalog
//! table records which tables migrations have created, so writes against a
//! table that was never created fail with `TableMissing` instead of silently
//! creating it. redb calls are blocking and run on the blocking pool.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{
    Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableError, WriteTransaction,
};
use tracing::{debug, info, instrument, trace};

use super::{ScanResults, StorageEngine, Table, WriteBatch, WriteOp};
use crate::error::StorageError;

// Key: table name, Value: creation time (unix millis)
const CATALOG: TableDefinition<&str, i64> = TableDefinition::new("peerbook_catalog");

type Rows = TableDefinition<'static, &'static [u8], &'static [u8]>;

fn definition(table: Table) -> Rows {
    TableDefinition::new(table.name())
}

fn database_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::database(err.to_string())
}

fn read_error(table: Table) -> impl FnOnce(TableError) -> StorageError {
    move |err| match err {
        TableError::TableDoesNotExist(_) => StorageError::table_missing(table.name()),
        other => database_error(other),
    }
}

/// Configuration for the redb engine
#[derive(Debug, Clone)]
pub struct RedbEngineConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbEngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/peerbook.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Durable implementation of StorageEngine
pub struct RedbEngine {
    db: Arc<Database>,
    config: RedbEngineConfig,
}

impl std::fmt::Debug for RedbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedbEngine {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbEngineConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(database_error)?;
        txn.open_table(CATALOG).map_err(database_error)?;
        txn.commit().map_err(database_error)?;

        info!("Opened redb database");

        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbEngineConfig {
        &self.config
    }

    /// Names of the tables created so far
    pub async fn table_names(&self) -> Result<Vec<String>, StorageError> {
        self.run(|db| {
            let txn = db.begin_read().map_err(database_error)?;
            let catalog = txn.open_table(CATALOG).map_err(database_error)?;

            let mut names = Vec::new();
            for entry in catalog.iter().map_err(database_error)? {
                let (name, _) = entry.map_err(database_error)?;
                names.push(name.value().to_string());
            }
            Ok(names)
        })
        .await
    }

    async fn run<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Database) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StorageError::database(format!("blocking task failed: {e}")))?
    }
}

fn ensure_created(txn: &WriteTransaction, tables: &[Table]) -> Result<(), StorageError> {
    let catalog = txn.open_table(CATALOG).map_err(database_error)?;
    for table in tables {
        if catalog.get(table.name()).map_err(database_error)?.is_none() {
            return Err(StorageError::table_missing(table.name()));
        }
    }
    Ok(())
}

fn apply(txn: &WriteTransaction, op: WriteOp) -> Result<usize, StorageError> {
    match op {
        WriteOp::Insert { table, key, value } => {
            let mut rows = txn.open_table(definition(table)).map_err(database_error)?;
            if rows.get(key.as_slice()).map_err(database_error)?.is_some() {
                return Err(StorageError::unique_violation(table.name(), &key));
            }
            rows.insert(key.as_slice(), value.as_slice())
                .map_err(database_error)?;
            Ok(0)
        }
        WriteOp::Put { table, key, value } => {
            let mut rows = txn.open_table(definition(table)).map_err(database_error)?;
            rows.insert(key.as_slice(), value.as_slice())
                .map_err(database_error)?;
            Ok(0)
        }
        WriteOp::Delete { table, key } => {
            let mut rows = txn.open_table(definition(table)).map_err(database_error)?;
            let removed = rows.remove(key.as_slice()).map_err(database_error)?.is_some();
            Ok(usize::from(removed))
        }
        WriteOp::DeletePrefix { table, prefix } => {
            let mut rows = txn.open_table(definition(table)).map_err(database_error)?;

            let mut keys = Vec::new();
            for entry in rows.range(prefix.as_slice()..).map_err(database_error)? {
                let (key, _) = entry.map_err(database_error)?;
                let key = key.value();
                if !key.starts_with(&prefix) {
                    break;
                }
                keys.push(key.to_vec());
            }

            for key in &keys {
                rows.remove(key.as_slice()).map_err(database_error)?;
            }
            Ok(keys.len())
        }
    }
}

#[async_trait]
impl StorageEngine for RedbEngine {
    async fn create_table(&self, table: Table) -> Result<(), StorageError> {
        self.run(move |db| {
            let txn = db.begin_write().map_err(database_error)?;
            txn.open_table(definition(table)).map_err(database_error)?;
            {
                let mut catalog = txn.open_table(CATALOG).map_err(database_error)?;
                if catalog.get(table.name()).map_err(database_error)?.is_none() {
                    let created = chrono::Utc::now().timestamp_millis();
                    catalog
                        .insert(table.name(), created)
                        .map_err(database_error)?;
                }
            }
            txn.commit().map_err(database_error)?;
            Ok(())
        })
        .await?;

        debug!(table = %table, "Created redb table");
        Ok(())
    }

    async fn drop_table(&self, table: Table) -> Result<(), StorageError> {
        let dropped = self
            .run(move |db| {
                let txn = db.begin_write().map_err(database_error)?;
                let dropped = txn.delete_table(definition(table)).map_err(database_error)?;
                {
                    let mut catalog = txn.open_table(CATALOG).map_err(database_error)?;
                    catalog.remove(table.name()).map_err(database_error)?;
                }
                txn.commit().map_err(database_error)?;
                Ok(dropped)
            })
            .await?;

        if dropped {
            debug!(table = %table, "Dropped redb table");
        }
        Ok(())
    }

    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let key = key.to_vec();
        self.run(move |db| {
            let txn = db.begin_read().map_err(database_error)?;
            let rows = txn.open_table(definition(table)).map_err(read_error(table))?;

            let value = rows
                .get(key.as_slice())
                .map_err(database_error)?
                .map(|v| v.value().to_vec());
            Ok(value)
        })
        .await
    }

    async fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<ScanResults, StorageError> {
        let prefix = prefix.to_vec();
        self.run(move |db| {
            let txn = db.begin_read().map_err(database_error)?;
            let rows = txn.open_table(definition(table)).map_err(read_error(table))?;

            let mut results = Vec::new();
            for entry in rows.range(prefix.as_slice()..).map_err(database_error)? {
                let (key, value) = entry.map_err(database_error)?;
                let key_bytes = key.value();

                // Stop when we're past the prefix
                if !key_bytes.starts_with(&prefix) {
                    break;
                }

                results.push((key_bytes.to_vec(), value.value().to_vec()));
            }
            Ok(results)
        })
        .await
    }

    async fn count(&self, table: Table) -> Result<usize, StorageError> {
        self.run(move |db| {
            let txn = db.begin_read().map_err(database_error)?;
            let rows = txn.open_table(definition(table)).map_err(read_error(table))?;
            let len = rows.len().map_err(database_error)?;
            Ok(len as usize)
        })
        .await
    }

    async fn insert_if_absent(
        &self,
        table: Table,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, StorageError> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.run(move |db| {
            let txn = db.begin_write().map_err(database_error)?;
            ensure_created(&txn, &[table])?;

            let inserted = {
                let mut rows = txn.open_table(definition(table)).map_err(database_error)?;
                if rows.get(key.as_slice()).map_err(database_error)?.is_some() {
                    false
                } else {
                    rows.insert(key.as_slice(), value.as_slice())
                        .map_err(database_error)?;
                    true
                }
            };

            if inserted {
                txn.commit().map_err(database_error)?;
            } else {
                trace!(table = %table, "Row already present, skipping insert");
                txn.abort().map_err(database_error)?;
            }
            Ok(inserted)
        })
        .await
    }

    async fn write(&self, batch: WriteBatch) -> Result<usize, StorageError> {
        self.run(move |db| {
            let txn = db.begin_write().map_err(database_error)?;

            let mut tables: Vec<Table> = batch.ops().map(WriteOp::table).collect();
            tables.sort_unstable();
            tables.dedup();

            let outcome = ensure_created(&txn, &tables).and_then(|()| {
                let mut removed = 0;
                for op in batch.into_ops() {
                    removed += apply(&txn, op)?;
                }
                Ok(removed)
            });

            match outcome {
                Ok(removed) => {
                    txn.commit().map_err(database_error)?;
                    Ok(removed)
                }
                Err(e) => {
                    trace!(error = %e, "Batch failed, aborting transaction");
                    txn.abort().map_err(database_error)?;
                    Err(e)
                }
            }
        })
        .await
    }
}
