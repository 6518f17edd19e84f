//! Pixel-space and map-space rectangles
//!
//! - [`GridBounds`]: inclusive integer rectangle over a pixel or tile grid
//! - [`Extent`]: floating-point bounding box in some coordinate system
//! - [`Crs`]: coordinate reference identifier (never transformed here)
//! - [`ProjectedExtent`] / [`TemporalProjectedExtent`]: footprint of a tile
//!   that has not been keyed to a layout yet

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive integer rectangle `(col_min, row_min, col_max, row_max)`
///
/// A well-formed bounds has `col_min <= col_max` and `row_min <= row_max`.
/// Construction does not validate; callers that accept bounds from outside
/// check [`GridBounds::is_well_formed`] or [`GridBounds::within`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridBounds {
    /// First column
    pub col_min: u32,
    /// First row
    pub row_min: u32,
    /// Last column (inclusive)
    pub col_max: u32,
    /// Last row (inclusive)
    pub row_max: u32,
}

impl GridBounds {
    /// Create bounds from inclusive corners
    pub const fn new(col_min: u32, row_min: u32, col_max: u32, row_max: u32) -> Self {
        Self {
            col_min,
            row_min,
            col_max,
            row_max,
        }
    }

    /// Bounds covering a whole `cols x rows` grid, `None` if either is zero
    pub fn full(cols: u32, rows: u32) -> Option<Self> {
        if cols == 0 || rows == 0 {
            return None;
        }
        Some(Self::new(0, 0, cols - 1, rows - 1))
    }

    /// `min <= max` on both axes
    pub fn is_well_formed(&self) -> bool {
        self.col_min <= self.col_max && self.row_min <= self.row_max
    }

    /// Well-formed and inside `[0, cols) x [0, rows)`
    pub fn within(&self, cols: u32, rows: u32) -> bool {
        self.is_well_formed() && self.col_max < cols && self.row_max < rows
    }

    /// Number of columns
    pub fn width(&self) -> u32 {
        self.col_max - self.col_min + 1
    }

    /// Number of rows
    pub fn height(&self) -> u32 {
        self.row_max - self.row_min + 1
    }

    /// Number of cells
    pub fn cell_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Check if `(col, row)` lies inside
    pub fn contains(&self, col: u32, row: u32) -> bool {
        col >= self.col_min && col <= self.col_max && row >= self.row_min && row <= self.row_max
    }

    /// Check if two bounds share at least one cell
    pub fn intersects(&self, other: &GridBounds) -> bool {
        self.col_min <= other.col_max
            && other.col_min <= self.col_max
            && self.row_min <= other.row_max
            && other.row_min <= self.row_max
    }

    /// Shared cells of two bounds
    pub fn intersection(&self, other: &GridBounds) -> Option<GridBounds> {
        if !self.intersects(other) {
            return None;
        }
        Some(GridBounds::new(
            self.col_min.max(other.col_min),
            self.row_min.max(other.row_min),
            self.col_max.min(other.col_max),
            self.row_max.min(other.row_max),
        ))
    }

    /// Smallest bounds covering both
    pub fn combine(&self, other: &GridBounds) -> GridBounds {
        GridBounds::new(
            self.col_min.min(other.col_min),
            self.row_min.min(other.row_min),
            self.col_max.max(other.col_max),
            self.row_max.max(other.row_max),
        )
    }

    /// Iterate cell coordinates in row-major order
    pub fn coords(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.row_min..=self.row_max)
            .flat_map(move |row| (self.col_min..=self.col_max).map(move |col| (col, row)))
    }
}

impl fmt::Display for GridBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.col_min, self.row_min, self.col_max, self.row_max
        )
    }
}

/// Bounding box `(xmin, ymin, xmax, ymax)` in map units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// West edge
    pub xmin: f64,
    /// South edge
    pub ymin: f64,
    /// East edge
    pub xmax: f64,
    /// North edge
    pub ymax: f64,
}

impl Extent {
    /// Create an extent from its edges
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// East-west size
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// North-south size
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Center point `(x, y)`
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// Check if a point lies inside, edges included
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Check if two extents overlap with positive area
    pub fn intersects(&self, other: &Extent) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    /// Overlap of two extents
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.intersects(other) {
            return None;
        }
        Some(Extent::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        ))
    }

    /// Smallest extent covering both
    pub fn combine(&self, other: &Extent) -> Extent {
        Extent::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
        )
    }

    /// Footprint of a pixel window in a `cols x rows` raster covering `self`
    ///
    /// Row 0 is the northern edge.
    pub fn window_extent(&self, cols: u32, rows: u32, window: &GridBounds) -> Extent {
        let cell_w = self.width() / f64::from(cols.max(1));
        let cell_h = self.height() / f64::from(rows.max(1));
        Extent::new(
            self.xmin + f64::from(window.col_min) * cell_w,
            self.ymax - (f64::from(window.row_max) + 1.0) * cell_h,
            self.xmin + (f64::from(window.col_max) + 1.0) * cell_w,
            self.ymax - f64::from(window.row_min) * cell_h,
        )
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extent({}, {}, {}, {})",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Coordinate reference system identifier
///
/// Only carried and compared; no reprojection happens in Tessera.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// EPSG registry code
    Epsg(u32),
    /// Free-form definition (proj string or WKT)
    Definition(String),
}

impl Crs {
    /// WGS 84 geographic coordinates
    pub const WGS84: Crs = Crs::Epsg(4326);
    /// Web Mercator
    pub const WEB_MERCATOR: Crs = Crs::Epsg(3857);
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Definition(def) => f.write_str(def),
        }
    }
}

/// Footprint of an unkeyed tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedExtent {
    /// Map-space footprint
    pub extent: Extent,
    /// Coordinate system of `extent`
    pub crs: Crs,
}

impl ProjectedExtent {
    /// Pair an extent with its CRS
    pub fn new(extent: Extent, crs: Crs) -> Self {
        Self { extent, crs }
    }
}

/// Footprint of an unkeyed tile observed at an instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalProjectedExtent {
    /// Map-space footprint
    pub extent: Extent,
    /// Coordinate system of `extent`
    pub crs: Crs,
    /// Acquisition time
    pub instant: DateTime<Utc>,
}

impl TemporalProjectedExtent {
    /// Create a timestamped footprint
    pub fn new(extent: Extent, crs: Crs, instant: DateTime<Utc>) -> Self {
        Self {
            extent,
            crs,
            instant,
        }
    }

    /// Drop the timestamp
    pub fn projected(&self) -> ProjectedExtent {
        ProjectedExtent::new(self.extent, self.crs.clone())
    }
}
