//! Shared fixtures for unit tests

use crate::attributes::{AttributeStore, LayerMetadata};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::{
    CellType, Crs, Extent, KeyBounds, LayerHeader, LayerId, LayoutDefinition, SpaceTimeKey, SpatialKey, Tile,
};
use tessera_index::{IndexConfig, KeyIndexMethod};
use tessera_storage::{Backend, MemoryBackend, StorageError, StorageResult};

pub fn memory_store() -> AttributeStore {
    AttributeStore::new(Arc::new(MemoryBackend::new()))
}

pub fn header() -> LayerHeader {
    let layout = LayoutDefinition::new(Extent::new(0.0, 0.0, 16.0, 16.0), 2, 2, 16, 16);
    LayerHeader::new(Crs::WGS84, CellType::U8, 1, layout)
}

pub fn spatial_meta(name: &str, zoom: u32) -> LayerMetadata {
    let bounds = KeyBounds::new(SpatialKey::new(0, 0), SpatialKey::new(15, 15));
    LayerMetadata::new::<SpatialKey>(
        LayerId::new(name, zoom),
        header(),
        IndexConfig::new(KeyIndexMethod::ZCurve, &bounds),
    )
}

/// 2x2 tile filled with `fill`
pub fn tile(fill: u8) -> Tile {
    Tile::new(2, 2, CellType::U8, vec![fill; 4]).unwrap()
}

pub fn grid_records(cols: u32, rows: u32) -> Vec<(SpatialKey, Tile)> {
    let mut records = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            records.push((SpatialKey::new(col, row), tile((row * cols + col) as u8)));
        }
    }
    records
}

pub fn space_time_records(instants: &[i64]) -> Vec<(SpaceTimeKey, Tile)> {
    let mut records = Vec::new();
    for (i, instant) in instants.iter().enumerate() {
        for col in 0..3 {
            records.push((SpaceTimeKey::new(col, 1, *instant), tile(i as u8 * 10 + col as u8)));
        }
    }
    records
}

pub fn sorted<K: Ord, V>(mut records: Vec<(K, V)>) -> Vec<(K, V)> {
    records.sort_by(|a, b| a.0.cmp(&b.0));
    records
}

// ============================================================================
// Fault injection
// ============================================================================

/// Memory backend whose tile writes and table drops can be made to fail
#[derive(Debug, Default)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    puts_left: AtomicUsize,
    armed: AtomicBool,
    fail_drops: AtomicBool,
}

impl FaultyBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let `n` more tile puts succeed, then fail every one after
    pub fn fail_puts_after(&self, n: usize) {
        self.puts_left.store(n, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn fail_drops(&self, fail: bool) {
        self.fail_drops.store(fail, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.fail_drops.store(false, Ordering::SeqCst);
    }

    fn injected() -> StorageError {
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "injected failure"))
    }
}

impl Backend for FaultyBackend {
    fn get(&self, table: &str, id: u64) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(table, id)
    }

    fn range_scan(&self, table: &str, start: u64, end: u64) -> StorageResult<Vec<(u64, Vec<u8>)>> {
        self.inner.range_scan(table, start, end)
    }

    fn put(&self, table: &str, id: u64, value: Vec<u8>) -> StorageResult<()> {
        if self.armed.load(Ordering::SeqCst)
            && self
                .puts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        {
            return Err(Self::injected());
        }
        self.inner.put(table, id, value)
    }

    fn delete(&self, table: &str, id: u64) -> StorageResult<bool> {
        self.inner.delete(table, id)
    }

    fn delete_range(&self, table: &str, start: u64, end: u64) -> StorageResult<usize> {
        self.inner.delete_range(table, start, end)
    }

    fn drop_table(&self, table: &str) -> StorageResult<bool> {
        if self.fail_drops.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.drop_table(table)
    }

    fn table_len(&self, table: &str) -> StorageResult<usize> {
        self.inner.table_len(table)
    }

    fn tables(&self) -> StorageResult<Vec<String>> {
        self.inner.tables()
    }

    fn meta_get(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.meta_get(name)
    }

    fn meta_put(&self, name: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.meta_put(name, value)
    }

    fn meta_delete(&self, name: &str) -> StorageResult<bool> {
        self.inner.meta_delete(name)
    }

    fn meta_list(&self) -> StorageResult<Vec<String>> {
        self.inner.meta_list()
    }
}
