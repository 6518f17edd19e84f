//! Window planning
//!
//! Partitions a `cols x rows` pixel grid into non-overlapping windows that
//! cover it exactly once, in row-major order.
//!
//! ## Segment alignment
//!
//! Rasters are stored in native segments (blocks or strips). Reading a
//! window that splits a segment re-reads the whole segment, so the step
//! along each axis is picked by [`segment_step`]:
//! - `max >= 2 * seg`: the largest multiple of `seg` not above `max`
//! - `max >= seg`: exactly `seg`
//! - otherwise the largest `seg / i` (for `2 <= i <= sqrt(seg)`) not above
//!   `max`, falling back to `max` itself, which may split segments
//!
//! The last window on each axis is clipped to the grid edge.

use crate::rasterize::{CoarseGrid, RasterizeOptions, Rasterizer};
use std::collections::BTreeSet;
use tessera_core::{Extent, GridBounds};
use tracing::debug;

/// Step along one axis for windows of at most `max` pixels over segments of
/// `seg` pixels
///
/// A segment size of 0 or 1 disables alignment.
pub fn segment_step(max: u32, seg: u32) -> u32 {
    if seg <= 1 {
        return max;
    }
    if max >= seg.saturating_mul(2) {
        return (max / seg) * seg;
    }
    if max >= seg {
        return seg;
    }
    let mut i = 2u32;
    while u64::from(i) * u64::from(i) <= u64::from(seg) {
        if seg % i == 0 && seg / i <= max {
            return seg / i;
        }
        i += 1;
    }
    max
}

/// Windows of `col_step x row_step`, row-major, clipped to the grid
fn stepped(cols: u32, rows: u32, col_step: u32, row_step: u32) -> Vec<GridBounds> {
    let col_step = col_step.max(1);
    let row_step = row_step.max(1);
    let mut windows =
        Vec::with_capacity(cols.div_ceil(col_step) as usize * rows.div_ceil(row_step) as usize);
    let mut row = 0u32;
    while row < rows {
        let row_max = row.saturating_add(row_step - 1).min(rows - 1);
        let mut col = 0u32;
        while col < cols {
            let col_max = col.saturating_add(col_step - 1).min(cols - 1);
            windows.push(GridBounds::new(col, row, col_max, row_max));
            col = match col.checked_add(col_step) {
                Some(next) => next,
                None => break,
            };
        }
        row = match row.checked_add(row_step) {
            Some(next) => next,
            None => break,
        };
    }
    windows
}

/// Windows of at most `max_window` pixels per side, without segment
/// alignment
///
/// `None` (or `Some(0)`) plans a single window over the whole grid. An empty
/// grid yields no windows.
///
/// # Example
///
/// ```
/// use tessera_raster::plan_grid;
/// use tessera_core::GridBounds;
///
/// let windows = plan_grid(10, 10, Some(4));
/// assert_eq!(windows.len(), 9);
/// assert_eq!(windows[2], GridBounds::new(8, 0, 9, 3));
/// ```
pub fn plan_grid(cols: u32, rows: u32, max_window: Option<u32>) -> Vec<GridBounds> {
    match max_window {
        Some(max) if max > 0 => stepped(cols, rows, max, max),
        _ => GridBounds::full(cols, rows).into_iter().collect(),
    }
}

/// Windows of at most `max_window` pixels per side, aligned to segments of
/// `seg_cols x seg_rows` where possible
pub fn plan_segmented(
    cols: u32,
    rows: u32,
    max_window: u32,
    seg_cols: u32,
    seg_rows: u32,
) -> Vec<GridBounds> {
    if max_window == 0 {
        return plan_grid(cols, rows, None);
    }
    let col_step = segment_step(max_window, seg_cols);
    let row_step = segment_step(max_window, seg_rows);
    debug!(cols, rows, max_window, col_step, row_step, "Planning segmented windows");
    stepped(cols, rows, col_step, row_step)
}

/// Segment-aligned windows whose footprint is covered by `geometry`
///
/// Builds a coarse grid with one cell per window over `extent`, asks the
/// rasterizer which cells `geometry` covers, and emits the window of each
/// covered cell, clamped to the raster edges. Windows come out row-major.
#[allow(clippy::too_many_arguments)]
pub fn plan_geometry<R: Rasterizer + ?Sized>(
    cols: u32,
    rows: u32,
    max_window: u32,
    extent: &Extent,
    seg_cols: u32,
    seg_rows: u32,
    geometry: &R::Geometry,
    rasterizer: &R,
    options: &RasterizeOptions,
) -> Vec<GridBounds> {
    if cols == 0 || rows == 0 {
        return Vec::new();
    }
    let (col_step, row_step) = if max_window == 0 {
        (cols, rows)
    } else {
        (
            segment_step(max_window, seg_cols).max(1),
            segment_step(max_window, seg_rows).max(1),
        )
    };
    let coarse_cols = cols.div_ceil(col_step);
    let coarse_rows = rows.div_ceil(row_step);

    // The coarse grid spans whole windows, so it may reach past the raster.
    let span = GridBounds::new(
        0,
        0,
        coarse_cols.saturating_mul(col_step) - 1,
        coarse_rows.saturating_mul(row_step) - 1,
    );
    let grid = CoarseGrid::new(extent.window_extent(cols, rows, &span), coarse_cols, coarse_rows);

    let mut covered = BTreeSet::new();
    rasterizer.for_each_covered_cell(geometry, &grid, options, &mut |col, row| {
        if col < coarse_cols && row < coarse_rows {
            covered.insert((row, col));
        }
    });
    debug!(
        coarse_cols,
        coarse_rows,
        covered = covered.len(),
        "Planned geometry windows"
    );

    covered
        .into_iter()
        .map(|(row, col)| {
            let col_min = col * col_step;
            let row_min = row * row_step;
            GridBounds::new(
                col_min,
                row_min,
                col_min.saturating_add(col_step - 1).min(cols - 1),
                row_min.saturating_add(row_step - 1).min(rows - 1),
            )
        })
        .collect()
}

/// Reusable planning parameters
///
/// ```
/// use tessera_raster::WindowPlanner;
///
/// let planner = WindowPlanner::new(512).with_segments(256, 256);
/// assert_eq!(planner.plan(1000, 600).len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowPlanner {
    max_window: Option<u32>,
    segments: Option<(u32, u32)>,
}

impl WindowPlanner {
    /// Windows of at most `max_window` pixels per side
    pub fn new(max_window: u32) -> Self {
        Self {
            max_window: Some(max_window),
            segments: None,
        }
    }

    /// One window over the whole grid
    pub fn whole() -> Self {
        Self::default()
    }

    /// Align windows to native segments of `seg_cols x seg_rows`
    pub fn with_segments(mut self, seg_cols: u32, seg_rows: u32) -> Self {
        self.segments = Some((seg_cols, seg_rows));
        self
    }

    /// Maximum window side, if any
    pub fn max_window(&self) -> Option<u32> {
        self.max_window
    }

    /// Plan windows for a `cols x rows` grid
    pub fn plan(&self, cols: u32, rows: u32) -> Vec<GridBounds> {
        match (self.max_window, self.segments) {
            (Some(max), Some((seg_cols, seg_rows))) => {
                plan_segmented(cols, rows, max, seg_cols, seg_rows)
            }
            (max, _) => plan_grid(cols, rows, max),
        }
    }
}
