//! Layer reads
//!
//! A bounding-box read costs one backend range scan per index range. Index
//! ranges may cover identifiers of keys outside the query, and an index is
//! not required to be injective, so every decoded record is re-checked
//! against the query before it is returned.

use crate::attributes::{AttributeStore, LayerMetadata};
use crate::bucket::{encode_key, Bucket};
use tessera_core::{KeyBounds, LayerId, Result, TileValue};
use tessera_index::{build_index, IndexableKey};
use tracing::debug;

/// Reads records back from a layer
#[derive(Debug, Clone)]
pub struct LayerReader {
    attributes: AttributeStore,
}

impl LayerReader {
    /// Create a reader over `attributes`
    pub fn new(attributes: AttributeStore) -> Self {
        Self { attributes }
    }

    /// Metadata of `layer`
    pub fn metadata(&self, layer: &LayerId) -> Result<LayerMetadata> {
        self.attributes.resolve(layer)
    }

    /// Records whose key lies inside `query`, in index order
    ///
    /// # Errors
    /// - `LayerNotFound` if the layer is not registered
    /// - `KeyTypeMismatch` if the layer holds another key shape
    /// - `ReindexPending` if a reindex swap overlapped the read; retry once
    ///   it completes
    pub fn read<K, V>(&self, layer: &LayerId, query: &KeyBounds<K>) -> Result<Vec<(K, V)>>
    where
        K: IndexableKey,
        V: TileValue,
    {
        let meta = self.attributes.resolve(layer)?;
        meta.check_key::<K>()?;
        let index = build_index::<K>(&meta.index)?;
        let table = layer.table_name();
        let backend = self.attributes.backend();

        let ranges = index.index_ranges(query);
        let mut records = Vec::new();
        let mut scanned = 0usize;
        for range in &ranges {
            for (_, bytes) in backend.range_scan(&table, range.start, range.end)? {
                scanned += 1;
                for entry in Bucket::decode(&bytes)?.entries() {
                    let key: K = entry.key()?;
                    if query.contains(&key) {
                        records.push((key, entry.value()?));
                    }
                }
            }
        }
        debug!(
            layer = %layer,
            ranges = ranges.len(),
            buckets = scanned,
            records = records.len(),
            "Read layer"
        );
        self.attributes.confirm(&meta)?;
        Ok(records)
    }

    /// Every record of `layer`, in index order
    ///
    /// # Errors
    /// Same as [`LayerReader::read`]
    pub fn read_all<K, V>(&self, layer: &LayerId) -> Result<Vec<(K, V)>>
    where
        K: IndexableKey,
        V: TileValue,
    {
        let meta = self.attributes.resolve(layer)?;
        meta.check_key::<K>()?;
        let mut records = Vec::new();
        for (_, bytes) in self.attributes.backend().range_scan(&layer.table_name(), 0, u64::MAX)? {
            records.extend(Bucket::decode(&bytes)?.records::<K, V>()?);
        }
        self.attributes.confirm(&meta)?;
        Ok(records)
    }

    /// Value stored under `key`
    ///
    /// # Errors
    /// Same as [`LayerReader::read`]; a bounded index that cannot address
    /// `key` yields `Ok(None)`
    pub fn read_key<K, V>(&self, layer: &LayerId, key: &K) -> Result<Option<V>>
    where
        K: IndexableKey,
        V: TileValue,
    {
        let meta = self.attributes.resolve(layer)?;
        meta.check_key::<K>()?;
        let index = build_index::<K>(&meta.index)?;
        let id = match index.to_index(key) {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };
        let bucket = Bucket::decode_opt(self.attributes.backend().get(&layer.table_name(), id)?)?;
        self.attributes.confirm(&meta)?;
        bucket.get(&encode_key(key)?).map(|entry| entry.value()).transpose()
    }
}
