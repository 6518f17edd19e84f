//! Sharded in-memory tables
//!
//! One `BTreeMap` per table, sharded by table name through a DashMap.
//!
//! # Design
//!
//! - DashMap: per-table shards, writes to one layer never lock another
//! - BTreeMap: identifiers stay sorted, so index ranges are plain range scans
//! - Metadata: a small FxHashMap behind a parking_lot RwLock
//!
//! [`FileBackend`](crate::FileBackend) keeps one of these as its in-memory
//! image and only adds the logs around it.

use crate::backend::{Backend, StorageResult};
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Records of one table, ordered by identifier
#[derive(Debug, Default)]
pub struct Table {
    pub(crate) data: BTreeMap<u64, Vec<u8>>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the table holds no records
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Detach every record with `start <= id <= end`
    fn split_range(&mut self, start: u64, end: u64) -> BTreeMap<u64, Vec<u8>> {
        let mut middle = self.data.split_off(&start);
        if let Some(after) = end.checked_add(1) {
            let mut tail = middle.split_off(&after);
            self.data.append(&mut tail);
        }
        middle
    }
}

/// In-memory backend, nothing survives the process
///
/// # Thread Safety
///
/// - reads take a shared guard on one table shard
/// - writes lock only the table they touch
/// - metadata has its own lock
///
/// # Example
///
/// ```
/// use tessera_storage::{Backend, MemoryBackend};
///
/// let store = MemoryBackend::new();
/// store.put("roads:3", 7, b"tile".to_vec()).unwrap();
/// assert_eq!(store.get("roads:3", 7).unwrap(), Some(b"tile".to_vec()));
/// ```
pub struct MemoryBackend {
    tables: DashMap<String, Table>,
    meta: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            meta: RwLock::new(FxHashMap::default()),
        }
    }

    /// Create with room for `tables` tables
    pub fn with_capacity(tables: usize) -> Self {
        Self {
            tables: DashMap::with_capacity(tables),
            meta: RwLock::new(FxHashMap::default()),
        }
    }

    /// Total records across all tables
    pub fn total_records(&self) -> usize {
        self.tables.iter().map(|entry| entry.value().len()).sum()
    }

    // ========================================================================
    // Table records
    // ========================================================================

    pub(crate) fn get_record(&self, table: &str, id: u64) -> Option<Vec<u8>> {
        self.tables
            .get(table)
            .and_then(|t| t.data.get(&id).cloned())
    }

    pub(crate) fn scan(&self, table: &str, start: u64, end: u64) -> Vec<(u64, Vec<u8>)> {
        if start > end {
            return Vec::new();
        }
        self.tables
            .get(table)
            .map(|t| {
                t.data
                    .range((Bound::Included(start), Bound::Included(end)))
                    .map(|(id, value)| (*id, value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn insert(&self, table: &str, id: u64, value: Vec<u8>) {
        if let Some(mut t) = self.tables.get_mut(table) {
            t.data.insert(id, value);
            return;
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .data
            .insert(id, value);
    }

    pub(crate) fn remove(&self, table: &str, id: u64) -> bool {
        self.tables
            .get_mut(table)
            .map(|mut t| t.data.remove(&id).is_some())
            .unwrap_or(false)
    }

    pub(crate) fn remove_range(&self, table: &str, start: u64, end: u64) -> usize {
        if start > end {
            return 0;
        }
        self.tables
            .get_mut(table)
            .map(|mut t| t.split_range(start, end).len())
            .unwrap_or(0)
    }

    pub(crate) fn remove_table(&self, table: &str) -> bool {
        self.tables
            .remove(table)
            .map(|(_, t)| !t.is_empty())
            .unwrap_or(false)
    }

    pub(crate) fn len_of(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    pub(crate) fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub(crate) fn meta_read(&self, name: &str) -> Option<Vec<u8>> {
        self.meta.read().get(name).cloned()
    }

    pub(crate) fn meta_write(&self, name: &str, value: Vec<u8>) {
        self.meta.write().insert(name.to_string(), value);
    }

    pub(crate) fn meta_remove(&self, name: &str) -> bool {
        self.meta.write().remove(name).is_some()
    }

    pub(crate) fn meta_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.meta.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("tables", &self.tables.len())
            .field("total_records", &self.total_records())
            .field("meta_entries", &self.meta.read().len())
            .finish()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, table: &str, id: u64) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.get_record(table, id))
    }

    fn range_scan(&self, table: &str, start: u64, end: u64) -> StorageResult<Vec<(u64, Vec<u8>)>> {
        Ok(self.scan(table, start, end))
    }

    fn put(&self, table: &str, id: u64, value: Vec<u8>) -> StorageResult<()> {
        self.insert(table, id, value);
        Ok(())
    }

    fn delete(&self, table: &str, id: u64) -> StorageResult<bool> {
        Ok(self.remove(table, id))
    }

    fn delete_range(&self, table: &str, start: u64, end: u64) -> StorageResult<usize> {
        Ok(self.remove_range(table, start, end))
    }

    fn drop_table(&self, table: &str) -> StorageResult<bool> {
        Ok(self.remove_table(table))
    }

    fn table_len(&self, table: &str) -> StorageResult<usize> {
        Ok(self.len_of(table))
    }

    fn tables(&self) -> StorageResult<Vec<String>> {
        Ok(self.table_names())
    }

    fn meta_get(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.meta_read(name))
    }

    fn meta_put(&self, name: &str, value: Vec<u8>) -> StorageResult<()> {
        self.meta_write(name, value);
        Ok(())
    }

    fn meta_delete(&self, name: &str) -> StorageResult<bool> {
        Ok(self.meta_remove(name))
    }

    fn meta_list(&self) -> StorageResult<Vec<String>> {
        Ok(self.meta_names())
    }
}
