//! Windowed raster extraction for Tessera
//!
//! Large rasters are never decoded whole on the windowed paths. Instead:
//! 1. [`planner`] partitions the pixel grid into windows, aligned to the
//!    raster's native segments where possible
//! 2. a [`TileCodec`] decodes one window at a time from a positioned
//!    [`RangeReader`]
//! 3. a [`RasterWindowReader`] pairs each decoded window with its map
//!    footprint (and acquisition time, for temporal shapes)
//!
//! Memory use is bounded by the window size the caller picks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod options;
pub mod planner;
pub mod rasterize;
pub mod reader;
pub mod source;

pub use codec::{RasterInfo, RawCodec, RawCodecError, RawHeader, TileCodec};
pub use options::ReadOptions;
pub use planner::{plan_geometry, plan_grid, plan_segmented, segment_step, WindowPlanner};
pub use rasterize::{CoarseGrid, ExtentRasterizer, RasterizeOptions, Rasterizer};
pub use reader::{
    Multiband, MultibandReader, RasterWindowReader, ReadShape, Singleband, SinglebandReader,
    TemporalMultiband, TemporalMultibandReader, TemporalSingleband, TemporalSinglebandReader,
    WindowIter, WindowReader,
};
pub use source::{ByteSource, BytesReader, FileRangeReader, RangeReader};
