//! Backend trait shared by every storage implementation

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying file system failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A log could not be decoded before its tail
    #[error("corrupt log {path} at offset {offset}: {reason}")]
    Corruption {
        /// Log file
        path: PathBuf,
        /// Byte offset of the bad entry
        offset: u64,
        /// What was wrong with it
        reason: String,
    },

    /// A log entry did not carry the key shape its table expects
    #[error("malformed entry in table {table}: {reason}")]
    Malformed {
        /// Table the entry belongs to
        table: String,
        /// What was wrong with it
        reason: String,
    },
}

/// Result type for backend operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for tessera_core::Error {
    fn from(err: StorageError) -> Self {
        tessera_core::Error::Storage(Box::new(err))
    }
}

/// Ordered `u64 -> bytes` tables plus a named metadata table
///
/// # Contract
///
/// - `range_scan` is inclusive on both ends and yields ascending identifiers.
/// - Writes to one table never affect another.
/// - Operations on a missing table behave as on an empty one.
/// - `delete`, `delete_range` and `drop_table` are idempotent.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Record stored under `id`
    fn get(&self, table: &str, id: u64) -> StorageResult<Option<Vec<u8>>>;

    /// Records with `start <= id <= end`, ascending
    fn range_scan(&self, table: &str, start: u64, end: u64) -> StorageResult<Vec<(u64, Vec<u8>)>>;

    /// Store `value` under `id`, replacing any previous record
    fn put(&self, table: &str, id: u64, value: Vec<u8>) -> StorageResult<()>;

    /// Remove the record under `id`; returns whether one existed
    fn delete(&self, table: &str, id: u64) -> StorageResult<bool>;

    /// Remove every record with `start <= id <= end`; returns how many
    fn delete_range(&self, table: &str, start: u64, end: u64) -> StorageResult<usize>;

    /// Remove a table and all its records; returns whether it existed
    fn drop_table(&self, table: &str) -> StorageResult<bool>;

    /// Number of records in a table
    fn table_len(&self, table: &str) -> StorageResult<usize>;

    /// Names of the tables holding at least one record
    fn tables(&self) -> StorageResult<Vec<String>>;

    /// Metadata document stored under `name`
    fn meta_get(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store a metadata document
    fn meta_put(&self, name: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove a metadata document; returns whether one existed
    fn meta_delete(&self, name: &str) -> StorageResult<bool>;

    /// Names of all metadata documents, sorted
    fn meta_list(&self) -> StorageResult<Vec<String>>;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn get(&self, table: &str, id: u64) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(table, id)
    }

    fn range_scan(&self, table: &str, start: u64, end: u64) -> StorageResult<Vec<(u64, Vec<u8>)>> {
        (**self).range_scan(table, start, end)
    }

    fn put(&self, table: &str, id: u64, value: Vec<u8>) -> StorageResult<()> {
        (**self).put(table, id, value)
    }

    fn delete(&self, table: &str, id: u64) -> StorageResult<bool> {
        (**self).delete(table, id)
    }

    fn delete_range(&self, table: &str, start: u64, end: u64) -> StorageResult<usize> {
        (**self).delete_range(table, start, end)
    }

    fn drop_table(&self, table: &str) -> StorageResult<bool> {
        (**self).drop_table(table)
    }

    fn table_len(&self, table: &str) -> StorageResult<usize> {
        (**self).table_len(table)
    }

    fn tables(&self) -> StorageResult<Vec<String>> {
        (**self).tables()
    }

    fn meta_get(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).meta_get(name)
    }

    fn meta_put(&self, name: &str, value: Vec<u8>) -> StorageResult<()> {
        (**self).meta_put(name, value)
    }

    fn meta_delete(&self, name: &str) -> StorageResult<bool> {
        (**self).meta_delete(name)
    }

    fn meta_list(&self) -> StorageResult<Vec<String>> {
        (**self).meta_list()
    }
}
