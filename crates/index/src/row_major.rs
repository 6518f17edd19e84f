//! Row-major key index
//!
//! Identifiers run along each row of the layer bounds, rows laid end to
//! end: `id = (row - row_min) * width + (col - col_min)`. A bounding-box
//! query costs one range per row, collapsing to a single range when the
//! query spans the full width.

use crate::{merge_ranges, IndexConfig, IndexRange, IndexRanges, KeyIndex, KeyIndexMethod};
use tessera_core::{Error, KeyBounds, Result, SpatialKey};

/// Row-major index over a fixed rectangle of spatial keys
#[derive(Debug, Clone)]
pub struct RowMajorIndex {
    bounds: KeyBounds<SpatialKey>,
    width: u64,
}

impl RowMajorIndex {
    /// Index the keys inside `bounds`
    pub fn new(bounds: KeyBounds<SpatialKey>) -> Self {
        let width = u64::from(bounds.max.col - bounds.min.col) + 1;
        Self { bounds, width }
    }

    fn id(&self, col: u32, row: u32) -> u64 {
        u64::from(row - self.bounds.min.row) * self.width + u64::from(col - self.bounds.min.col)
    }
}

impl KeyIndex<SpatialKey> for RowMajorIndex {
    fn config(&self) -> IndexConfig {
        IndexConfig::new(KeyIndexMethod::RowMajor, &self.bounds)
    }

    fn key_bounds(&self) -> &KeyBounds<SpatialKey> {
        &self.bounds
    }

    fn to_index(&self, key: &SpatialKey) -> Result<u64> {
        if !self.bounds.contains(key) {
            return Err(Error::KeyOutOfBounds {
                key: key.to_string(),
                bounds: self.bounds.to_string(),
            });
        }
        Ok(self.id(key.col, key.row))
    }

    fn index_ranges(&self, query: &KeyBounds<SpatialKey>) -> IndexRanges {
        let clipped = match self.bounds.grid_bounds().intersection(&query.grid_bounds()) {
            Some(clipped) => clipped,
            None => return IndexRanges::new(),
        };
        let mut ranges: IndexRanges = (clipped.row_min..=clipped.row_max)
            .map(|row| IndexRange::new(self.id(clipped.col_min, row), self.id(clipped.col_max, row)))
            .collect();
        merge_ranges(&mut ranges);
        ranges
    }
}
