//! Tiling layout of a layer
//!
//! A [`LayoutDefinition`] lays a `layout_cols x layout_rows` grid of tiles
//! over an extent; each tile is `tile_cols x tile_rows` pixels. It is what
//! turns an unkeyed footprint into a [`SpatialKey`] during ingest.

use crate::geometry::{Extent, ProjectedExtent, TemporalProjectedExtent};
use crate::key::{SpaceTimeKey, SpatialKey};
use serde::{Deserialize, Serialize};

/// Tile grid laid over a map extent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDefinition {
    /// Area covered by the whole grid
    pub extent: Extent,
    /// Tile width in pixels
    pub tile_cols: u32,
    /// Tile height in pixels
    pub tile_rows: u32,
    /// Number of tile columns
    pub layout_cols: u32,
    /// Number of tile rows
    pub layout_rows: u32,
}

impl LayoutDefinition {
    /// Create a layout
    pub fn new(extent: Extent, tile_cols: u32, tile_rows: u32, layout_cols: u32, layout_rows: u32) -> Self {
        Self {
            extent,
            tile_cols,
            tile_rows,
            layout_cols,
            layout_rows,
        }
    }

    /// Layout for a `cols x rows` raster cut into tiles of at most `tile_size`
    pub fn for_raster(extent: Extent, cols: u32, rows: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        let layout_cols = cols.div_ceil(tile_size).max(1);
        let layout_rows = rows.div_ceil(tile_size).max(1);
        // Grow the extent so that whole tiles keep the raster's cell size.
        let cell_w = extent.width() / f64::from(cols.max(1));
        let cell_h = extent.height() / f64::from(rows.max(1));
        let grid_extent = Extent::new(
            extent.xmin,
            extent.ymax - f64::from(layout_rows * tile_size) * cell_h,
            extent.xmin + f64::from(layout_cols * tile_size) * cell_w,
            extent.ymax,
        );
        Self::new(grid_extent, tile_size, tile_size, layout_cols, layout_rows)
    }

    /// Map width of one tile
    pub fn tile_width(&self) -> f64 {
        self.extent.width() / f64::from(self.layout_cols.max(1))
    }

    /// Map height of one tile
    pub fn tile_height(&self) -> f64 {
        self.extent.height() / f64::from(self.layout_rows.max(1))
    }

    /// Grid cell containing a map point, `None` outside the layout
    pub fn key_for_point(&self, x: f64, y: f64) -> Option<SpatialKey> {
        if !self.extent.contains_point(x, y) {
            return None;
        }
        let col = ((x - self.extent.xmin) / self.tile_width()).floor() as u32;
        let row = ((self.extent.ymax - y) / self.tile_height()).floor() as u32;
        // Points on the east or south edge belong to the last tile.
        Some(SpatialKey::new(
            col.min(self.layout_cols.saturating_sub(1)),
            row.min(self.layout_rows.saturating_sub(1)),
        ))
    }

    /// Map footprint of a key
    pub fn key_extent(&self, key: SpatialKey) -> Extent {
        let w = self.tile_width();
        let h = self.tile_height();
        Extent::new(
            self.extent.xmin + f64::from(key.col) * w,
            self.extent.ymax - f64::from(key.row + 1) * h,
            self.extent.xmin + f64::from(key.col + 1) * w,
            self.extent.ymax - f64::from(key.row) * h,
        )
    }
}

/// Footprints that can be keyed against a layout
pub trait FootprintKey<K> {
    /// Key of the tile whose center holds this footprint's center
    fn layout_key(&self, layout: &LayoutDefinition) -> Option<K>;
}

impl FootprintKey<SpatialKey> for ProjectedExtent {
    fn layout_key(&self, layout: &LayoutDefinition) -> Option<SpatialKey> {
        let (x, y) = self.extent.center();
        layout.key_for_point(x, y)
    }
}

impl FootprintKey<SpaceTimeKey> for TemporalProjectedExtent {
    fn layout_key(&self, layout: &LayoutDefinition) -> Option<SpaceTimeKey> {
        let (x, y) = self.extent.center();
        let key = layout.key_for_point(x, y)?;
        Some(SpaceTimeKey::at(key.col, key.row, self.instant))
    }
}
