//! Z-order (Morton) key indexes
//!
//! [`ZCurveIndex`] interleaves absolute column and row bits, so it is not
//! limited by the bounds it was built with. [`ZSpaceTimeIndex`] interleaves
//! column, row and a time bin, each relative to the lower corner of its
//! bounds and limited to 21 bits.

use crate::morton::{
    decompose, encode2, encode2_array, encode3, encode3_array, ZBox, BITS_2D, BITS_3D,
    DEFAULT_RANGE_BUDGET,
};
use crate::{IndexConfig, IndexRanges, KeyIndex, KeyIndexMethod};
use tessera_core::{Error, KeyBounds, LayerKey, Result, SpaceTimeKey, SpatialKey};

/// Morton order over spatial keys
#[derive(Debug, Clone)]
pub struct ZCurveIndex {
    bounds: KeyBounds<SpatialKey>,
}

impl ZCurveIndex {
    /// Build for keys expected inside `bounds`
    pub fn new(bounds: KeyBounds<SpatialKey>) -> Self {
        Self { bounds }
    }
}

impl KeyIndex<SpatialKey> for ZCurveIndex {
    fn config(&self) -> IndexConfig {
        IndexConfig::new(KeyIndexMethod::ZCurve, &self.bounds)
    }

    fn key_bounds(&self) -> &KeyBounds<SpatialKey> {
        &self.bounds
    }

    fn to_index(&self, key: &SpatialKey) -> Result<u64> {
        Ok(encode2(key.col, key.row))
    }

    fn index_ranges(&self, query: &KeyBounds<SpatialKey>) -> IndexRanges {
        let zbox = ZBox {
            min: [query.min.col, query.min.row],
            max: [query.max.col, query.max.row],
        };
        decompose(&zbox, BITS_2D, encode2_array, DEFAULT_RANGE_BUDGET)
    }
}

/// Morton order over column, row and time bin
#[derive(Debug, Clone)]
pub struct ZSpaceTimeIndex {
    bounds: KeyBounds<SpaceTimeKey>,
    resolution_ms: i64,
}

const MAX_COORD_3D: u64 = (1 << BITS_3D) - 1;

impl ZSpaceTimeIndex {
    /// Build for keys inside `bounds`, binning time by `resolution_ms`
    ///
    /// # Errors
    /// `InvalidConfig` if the resolution is not positive or the bounds do not
    /// fit in 21 bits per dimension
    pub fn new(bounds: KeyBounds<SpaceTimeKey>, resolution_ms: i64) -> Result<Self> {
        if resolution_ms <= 0 {
            return Err(Error::InvalidConfig(format!(
                "temporal resolution must be positive, got {}ms",
                resolution_ms
            )));
        }
        let index = Self {
            bounds,
            resolution_ms,
        };
        let cols = u64::from(index.bounds.max.col - index.bounds.min.col);
        let rows = u64::from(index.bounds.max.row - index.bounds.min.row);
        let bins = index.bin(index.bounds.max.instant);
        if cols > MAX_COORD_3D || rows > MAX_COORD_3D || bins > MAX_COORD_3D {
            return Err(Error::InvalidConfig(format!(
                "bounds {} exceed the space-time curve at {}ms bins",
                index.bounds, resolution_ms
            )));
        }
        Ok(index)
    }

    /// Time bin of `instant` relative to the bounds start
    fn bin(&self, instant: i64) -> u64 {
        let offset = i128::from(instant) - i128::from(self.bounds.min.instant);
        (offset.max(0) / i128::from(self.resolution_ms)) as u64
    }

    fn coords(&self, key: &SpaceTimeKey) -> [u32; 3] {
        [
            key.col - self.bounds.min.col,
            key.row - self.bounds.min.row,
            self.bin(key.instant) as u32,
        ]
    }
}

impl KeyIndex<SpaceTimeKey> for ZSpaceTimeIndex {
    fn config(&self) -> IndexConfig {
        IndexConfig::new(
            KeyIndexMethod::ZCurveSpaceTime {
                temporal_resolution_ms: self.resolution_ms,
            },
            &self.bounds,
        )
    }

    fn key_bounds(&self) -> &KeyBounds<SpaceTimeKey> {
        &self.bounds
    }

    fn to_index(&self, key: &SpaceTimeKey) -> Result<u64> {
        if !self.bounds.contains(key) {
            return Err(Error::KeyOutOfBounds {
                key: key.to_string(),
                bounds: self.bounds.to_string(),
            });
        }
        let [x, y, t] = self.coords(key);
        Ok(encode3(x, y, t))
    }

    fn index_ranges(&self, query: &KeyBounds<SpaceTimeKey>) -> IndexRanges {
        let min = query.min.max_bound(&self.bounds.min);
        let max = query.max.min_bound(&self.bounds.max);
        if min.col > max.col || min.row > max.row || min.instant > max.instant {
            return IndexRanges::new();
        }
        let zbox = ZBox {
            min: self.coords(&min),
            max: self.coords(&max),
        };
        decompose(&zbox, BITS_3D, encode3_array, DEFAULT_RANGE_BUDGET)
    }
}
