//! Key indexes for Tessera layers
//!
//! A key index maps every key of a layer to a `u64` index identifier. The
//! storage backend keeps records sorted by that identifier, so the index
//! decides which keys end up next to each other:
//! - [`RowMajorIndex`]: rows laid end to end inside the layer bounds
//! - [`ZCurveIndex`]: Morton order over absolute tile coordinates
//! - [`ZSpaceTimeIndex`]: 3D Morton order over column, row and time bin
//!
//! ## Contract
//!
//! - `to_index` is deterministic for a given configuration.
//! - `index_ranges(query)` returns ascending, non-overlapping, inclusive
//!   ranges whose union contains the identifier of every key inside
//!   `query`. Ranges may cover extra identifiers; readers re-check keys.
//! - Indexes are not required to be injective.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod method;
pub mod morton;
pub mod row_major;
pub mod zcurve;

pub use method::{IndexConfig, KeyIndexMethod};
pub use row_major::RowMajorIndex;
pub use zcurve::{ZCurveIndex, ZSpaceTimeIndex};

use smallvec::SmallVec;
use std::fmt;
use tessera_core::{Error, KeyBounds, LayerKey, Result, SpaceTimeKey, SpatialKey};

/// Inclusive range of index identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexRange {
    /// First identifier
    pub start: u64,
    /// Last identifier (inclusive)
    pub end: u64,
}

impl IndexRange {
    /// Create a range
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Check if `id` lies inside
    pub fn contains(&self, id: u64) -> bool {
        id >= self.start && id <= self.end
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Ranges returned by [`KeyIndex::index_ranges`]
pub type IndexRanges = SmallVec<[IndexRange; 8]>;

/// Maps layer keys to ordered storage identifiers
pub trait KeyIndex<K: LayerKey>: Send + Sync + fmt::Debug {
    /// Configuration this index was built from
    fn config(&self) -> IndexConfig;

    /// Keys this index was built for
    fn key_bounds(&self) -> &KeyBounds<K>;

    /// Identifier of `key`
    ///
    /// # Errors
    /// `KeyOutOfBounds` if a bounded index cannot address `key`
    fn to_index(&self, key: &K) -> Result<u64>;

    /// Identifier ranges covering every key inside `query`
    fn index_ranges(&self, query: &KeyBounds<K>) -> IndexRanges;
}

/// Keys that know which index strategies apply to them
pub trait IndexableKey: LayerKey {
    /// Build the index described by `config`
    ///
    /// # Errors
    /// `InvalidConfig` if the method does not apply to this key type or the
    /// persisted bounds are unusable
    fn build_index(config: &IndexConfig) -> Result<Box<dyn KeyIndex<Self>>>;
}

impl IndexableKey for SpatialKey {
    fn build_index(config: &IndexConfig) -> Result<Box<dyn KeyIndex<Self>>> {
        let bounds = config.key_bounds::<SpatialKey>()?;
        match config.method {
            KeyIndexMethod::RowMajor => Ok(Box::new(RowMajorIndex::new(bounds))),
            KeyIndexMethod::ZCurve => Ok(Box::new(ZCurveIndex::new(bounds))),
            KeyIndexMethod::ZCurveSpaceTime { .. } => Err(Error::InvalidConfig(format!(
                "{} does not apply to spatial keys",
                config.method
            ))),
        }
    }
}

impl IndexableKey for SpaceTimeKey {
    fn build_index(config: &IndexConfig) -> Result<Box<dyn KeyIndex<Self>>> {
        let bounds = config.key_bounds::<SpaceTimeKey>()?;
        match config.method {
            KeyIndexMethod::ZCurveSpaceTime {
                temporal_resolution_ms,
            } => Ok(Box::new(ZSpaceTimeIndex::new(bounds, temporal_resolution_ms)?)),
            _ => Err(Error::InvalidConfig(format!(
                "{} does not apply to space-time keys",
                config.method
            ))),
        }
    }
}

/// Build the index for `K` described by `config`
pub fn build_index<K: IndexableKey>(config: &IndexConfig) -> Result<Box<dyn KeyIndex<K>>> {
    K::build_index(config)
}

/// Sort ranges and merge the ones that overlap or touch
pub fn merge_ranges(ranges: &mut IndexRanges) {
    if ranges.len() < 2 {
        return;
    }
    ranges.sort_unstable();
    let mut merged: IndexRanges = SmallVec::with_capacity(ranges.len());
    for range in ranges.drain(..) {
        match merged.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    *ranges = merged;
}
