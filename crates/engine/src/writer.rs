//! Layer writes
//!
//! ## Design
//!
//! Records are grouped by index identifier and written one bucket at a time
//! in ascending identifier order. Each bucket write merges into whatever the
//! bucket already holds, so a key written twice keeps only its latest value
//! and keys sharing an identifier are preserved.
//!
//! Ascending order makes [`WriteProgress::last_index`] a resume point: a
//! failure partway leaves every bucket at or below it complete and every
//! bucket above it untouched.

use crate::attributes::{AttributeStore, LayerMetadata};
use crate::bucket::{encode_key, Bucket, Entry};
use crate::deleter::LayerDeleter;
use std::collections::BTreeMap;
use std::fmt;
use tessera_core::{
    CompositeStage, Error, KeyBounds, LayerHeader, LayerId, Result, TileValue, WriteProgress,
};
use tessera_index::{build_index, IndexConfig, IndexableKey, KeyIndex, KeyIndexMethod};
use tessera_storage::Backend;
use tracing::{debug, info};

/// What to do when the target layer already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with `LayerExists`
    #[default]
    Create,
    /// Merge into the existing layer, last write wins per key
    Append,
    /// Delete the existing layer, then write
    Overwrite,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Create => f.write_str("create"),
            WriteMode::Append => f.write_str("append"),
            WriteMode::Overwrite => f.write_str("overwrite"),
        }
    }
}

/// Merge function applied when an update hits an existing key
pub type MergeFn<'a, V> = &'a dyn Fn(&V, &V) -> V;

/// How a write relates to the layer's registered metadata
pub(crate) enum Target {
    /// Layer is registered; re-register only if the key bounds grew
    Existing,
    /// Layer is new
    New,
    /// Layer is registered and must be deleted first
    Replace,
}

/// Writes records into layers
#[derive(Debug, Clone)]
pub struct LayerWriter {
    attributes: AttributeStore,
}

impl LayerWriter {
    /// Create a writer over `attributes`
    pub fn new(attributes: AttributeStore) -> Self {
        Self { attributes }
    }

    /// Write `records` into `layer` under a `method` index spanning them
    ///
    /// The index bounds are the tightest bounds of `records`. When appending
    /// to an existing layer, its own index is used and `header` and `method`
    /// are ignored.
    ///
    /// # Errors
    /// - `LayerExists` if the layer exists and `mode` is `Create`
    /// - `InvalidConfig` if `records` is empty and the layer does not exist,
    ///   or `method` does not apply to `K`
    /// - `PartialWrite` if the backend failed after the first bucket write
    ///   was attempted
    pub fn write<K, V>(
        &self,
        layer: &LayerId,
        header: LayerHeader,
        method: KeyIndexMethod,
        records: Vec<(K, V)>,
        mode: WriteMode,
    ) -> Result<WriteProgress>
    where
        K: IndexableKey,
        V: TileValue,
    {
        let bounds = match KeyBounds::from_keys(records.iter().map(|(k, _)| k)) {
            Some(bounds) => bounds,
            None => match (mode, self.attributes.try_lookup(layer)?) {
                (WriteMode::Append, Some(meta)) => meta.key_bounds::<K>()?,
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "cannot derive index bounds for {} from an empty record set",
                        layer
                    )))
                }
            },
        };
        self.write_with_index(layer, header, IndexConfig::new(method, &bounds), records, mode)
    }

    /// Write `records` into `layer` under an explicit index configuration
    ///
    /// A Z-curve index whose bounds do not cover `records` is widened; bounded
    /// indexes reject keys outside their bounds.
    ///
    /// # Errors
    /// Same as [`LayerWriter::write`], plus `KeyOutOfBounds` from bounded
    /// indexes and `ReindexPending` while a reindex of the layer is pending
    pub fn write_with_index<K, V>(
        &self,
        layer: &LayerId,
        header: LayerHeader,
        index: IndexConfig,
        records: Vec<(K, V)>,
        mode: WriteMode,
    ) -> Result<WriteProgress>
    where
        K: IndexableKey,
        V: TileValue,
    {
        if self.attributes.read_marker(layer)?.is_some() {
            return Err(Error::ReindexPending {
                layer: layer.clone(),
            });
        }
        let fresh = || LayerMetadata::new::<K>(layer.clone(), header.clone(), index);
        let (meta, target) = match (self.attributes.try_lookup(layer)?, mode) {
            (Some(_), WriteMode::Create) => {
                return Err(Error::LayerExists {
                    layer: layer.clone(),
                })
            }
            (Some(meta), WriteMode::Append) => {
                meta.check_key::<K>()?;
                (meta, Target::Existing)
            }
            (Some(_), WriteMode::Overwrite) => (fresh(), Target::Replace),
            (None, _) => (fresh(), Target::New),
        };

        let progress = store_records(&self.attributes, meta, target, records, None)?;
        info!(
            layer = %layer,
            mode = %mode,
            buckets = progress.buckets_written,
            records = progress.records_written,
            "Wrote layer"
        );
        Ok(progress)
    }
}

// ============================================================================
// Shared write path
// ============================================================================

/// Group items by the index identifier of their key, ascending
///
/// A later item with the same key replaces an earlier one.
///
/// # Errors
/// `KeyOutOfBounds` if the index cannot address a key
pub(crate) fn group_by_index<K, T>(
    index: &dyn KeyIndex<K>,
    items: impl IntoIterator<Item = (K, T)>,
) -> Result<BTreeMap<u64, Vec<(K, T)>>>
where
    K: IndexableKey,
{
    let mut groups: BTreeMap<u64, Vec<(K, T)>> = BTreeMap::new();
    for (key, item) in items {
        let group = groups.entry(index.to_index(&key)?).or_default();
        match group.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = item,
            None => group.push((key, item)),
        }
    }
    Ok(groups)
}

/// Metadata whose index bounds also cover `bounds`, and whether they grew
pub(crate) fn covering<K: IndexableKey>(
    meta: LayerMetadata,
    bounds: Option<KeyBounds<K>>,
) -> Result<(LayerMetadata, bool)> {
    let bounds = match bounds {
        Some(bounds) => bounds,
        None => return Ok((meta, false)),
    };
    let current = meta.key_bounds::<K>()?;
    let combined = current.combine(&bounds);
    if combined == current {
        return Ok((meta, false));
    }
    let index = IndexConfig::new(meta.index.method, &combined);
    Ok((meta.reindexed(index), true))
}

/// Register metadata as `target` requires, then write `records` bucket by bucket
pub(crate) fn store_records<K, V>(
    attributes: &AttributeStore,
    meta: LayerMetadata,
    target: Target,
    records: Vec<(K, V)>,
    merge: Option<MergeFn<'_, V>>,
) -> Result<WriteProgress>
where
    K: IndexableKey,
    V: TileValue,
{
    let layer = meta.layer.clone();
    let index = build_index::<K>(&meta.index)?;
    let groups = group_by_index(index.as_ref(), records)?;
    let bounds = KeyBounds::from_keys(groups.values().flatten().map(|(k, _)| k));
    let (meta, grown) = covering(meta, bounds)?;

    match target {
        Target::Existing if grown => attributes.register(&meta, true)?,
        Target::Existing => {}
        Target::New => attributes.register(&meta, false)?,
        Target::Replace => {
            LayerDeleter::new(attributes.clone()).delete(&layer)?;
            attributes.register(&meta, false)?;
        }
    }

    let mut progress = WriteProgress::new(layer.clone());
    put_buckets(
        attributes.backend().as_ref(),
        &layer,
        groups,
        None,
        &mut progress,
        |bucket, (key, value)| {
            let value = match merge {
                Some(merge) => {
                    let existing = bucket
                        .get(&encode_key(&key)?)
                        .map(|entry| entry.value::<V>())
                        .transpose()?;
                    match existing {
                        Some(old) => merge(&old, &value),
                        None => value,
                    }
                }
                None => value,
            };
            bucket.upsert(Entry::encode(&key, &value)?);
            Ok(())
        },
    )
    .map_err(|e| e.into_partial(CompositeStage::Write, progress.clone()))?;
    Ok(progress)
}

/// Merge each group into its bucket and write it back, ascending
///
/// Groups at or below `resume_after` are skipped. `progress` advances once
/// per bucket written, so on error it describes what is durable.
pub(crate) fn put_buckets<K, T, F>(
    backend: &dyn Backend,
    layer: &LayerId,
    groups: BTreeMap<u64, Vec<(K, T)>>,
    resume_after: Option<u64>,
    progress: &mut WriteProgress,
    mut apply: F,
) -> Result<()>
where
    F: FnMut(&mut Bucket, (K, T)) -> Result<()>,
{
    let table = layer.table_name();
    for (id, group) in groups {
        if resume_after.map_or(false, |last| id <= last) {
            continue;
        }
        let count = group.len();
        let mut bucket = Bucket::decode_opt(backend.get(&table, id)?)?;
        for item in group {
            apply(&mut bucket, item)?;
        }
        backend.put(&table, id, bucket.encode()?)?;
        progress.advance(id, count);
        debug!(layer = %layer, index = id, records = count, "Wrote bucket");
    }
    Ok(())
}
