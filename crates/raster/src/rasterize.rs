//! Rasterizer seam used by geometry-restricted planning
//!
//! Scan conversion itself is out of scope; planning only needs to know which
//! cells of a coarse grid a geometry covers. [`ExtentRasterizer`] answers
//! that for axis-aligned boxes.

use tessera_core::Extent;

/// Options passed through to the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizeOptions {
    /// Accept every cell the geometry touches, not only cells whose center
    /// it contains. Defaults to `true`, so no window overlapping the
    /// geometry is dropped.
    pub all_touched: bool,
}

impl Default for RasterizeOptions {
    fn default() -> Self {
        Self { all_touched: true }
    }
}

/// Grid of `cols x rows` equal cells laid over `extent`, row 0 at the top
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoarseGrid {
    /// Area covered by the grid
    pub extent: Extent,
    /// Number of cell columns
    pub cols: u32,
    /// Number of cell rows
    pub rows: u32,
}

impl CoarseGrid {
    /// Create a grid
    pub fn new(extent: Extent, cols: u32, rows: u32) -> Self {
        Self { extent, cols, rows }
    }

    /// Map footprint of cell `(col, row)`
    pub fn cell_extent(&self, col: u32, row: u32) -> Extent {
        let w = self.extent.width() / f64::from(self.cols.max(1));
        let h = self.extent.height() / f64::from(self.rows.max(1));
        Extent::new(
            self.extent.xmin + f64::from(col) * w,
            self.extent.ymax - f64::from(row + 1) * h,
            self.extent.xmin + f64::from(col + 1) * w,
            self.extent.ymax - f64::from(row) * h,
        )
    }
}

/// Scan conversion of a geometry against a coarse grid
pub trait Rasterizer {
    /// Geometry type understood by this rasterizer
    type Geometry: ?Sized;

    /// Call `cell(col, row)` once for every grid cell `geometry` covers
    fn for_each_covered_cell(
        &self,
        geometry: &Self::Geometry,
        grid: &CoarseGrid,
        options: &RasterizeOptions,
        cell: &mut dyn FnMut(u32, u32),
    );
}

/// Rasterizer for bounding boxes
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtentRasterizer;

impl Rasterizer for ExtentRasterizer {
    type Geometry = Extent;

    fn for_each_covered_cell(
        &self,
        geometry: &Extent,
        grid: &CoarseGrid,
        options: &RasterizeOptions,
        cell: &mut dyn FnMut(u32, u32),
    ) {
        if !grid.extent.intersects(geometry) {
            return;
        }
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let footprint = grid.cell_extent(col, row);
                let covered = if options.all_touched {
                    footprint.intersects(geometry)
                } else {
                    let (x, y) = footprint.center();
                    geometry.contains_point(x, y)
                };
                if covered {
                    cell(col, row);
                }
            }
        }
    }
}
