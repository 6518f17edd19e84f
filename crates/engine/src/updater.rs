//! Layer updates
//!
//! An update merges records into an existing layer: keys present in the
//! update are replaced (or combined by a caller merge function), every other
//! key is left untouched. The recorded key bounds grow to cover the update.

use crate::attributes::AttributeStore;
use crate::writer::{store_records, MergeFn, Target};
use tessera_core::{Error, LayerId, Result, TileValue, WriteProgress};
use tessera_index::IndexableKey;
use tracing::info;

/// Merges records into existing layers
#[derive(Debug, Clone)]
pub struct LayerUpdater {
    attributes: AttributeStore,
}

impl LayerUpdater {
    /// Create an updater over `attributes`
    pub fn new(attributes: AttributeStore) -> Self {
        Self { attributes }
    }

    /// Merge `records` into `layer`, last write wins per key
    ///
    /// # Errors
    /// - `LayerNotFound` if the layer does not exist
    /// - `KeyTypeMismatch` if the layer holds another key shape
    /// - `KeyOutOfBounds` if the layer's index is bounded and a key falls
    ///   outside it
    /// - `PartialWrite` if the backend failed partway
    pub fn update<K, V>(&self, layer: &LayerId, records: Vec<(K, V)>) -> Result<WriteProgress>
    where
        K: IndexableKey,
        V: TileValue,
    {
        self.apply(layer, records, None)
    }

    /// Merge `records` into `layer`, combining with `merge(existing, new)`
    /// where a key is already present
    ///
    /// # Errors
    /// Same as [`LayerUpdater::update`]
    pub fn update_with<K, V, F>(&self, layer: &LayerId, records: Vec<(K, V)>, merge: F) -> Result<WriteProgress>
    where
        K: IndexableKey,
        V: TileValue,
        F: Fn(&V, &V) -> V,
    {
        self.apply(layer, records, Some(&merge as MergeFn<'_, V>))
    }

    fn apply<K, V>(&self, layer: &LayerId, records: Vec<(K, V)>, merge: Option<MergeFn<'_, V>>) -> Result<WriteProgress>
    where
        K: IndexableKey,
        V: TileValue,
    {
        let meta = self.attributes.resolve(layer)?;
        meta.check_key::<K>()?;
        if self.attributes.read_marker(layer)?.is_some() {
            return Err(Error::ReindexPending {
                layer: layer.clone(),
            });
        }
        let progress = store_records(&self.attributes, meta, Target::Existing, records, merge)?;
        info!(
            layer = %layer,
            records = progress.records_written,
            merged = merge.is_some(),
            "Updated layer"
        );
        Ok(progress)
    }
}
