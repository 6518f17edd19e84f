//! Tile codec seam and the raw reference codec
//!
//! Extraction never parses raster bytes itself. It asks a [`TileCodec`] for
//! the header ([`RasterInfo`]) and for decoded windows, and passes codec
//! errors through unchanged as [`tessera_core::Error::Codec`].
//!
//! ## Raw format
//!
//! [`RawCodec`] reads a minimal band-sequential format:
//!
//! ```text
//! +--------+----------------+-------------------+----------------------------+
//! | "TSRW" | hlen: u32 (BE) | header JSON       | band 0 rows, band 1 rows.. |
//! +--------+----------------+-------------------+----------------------------+
//! ```
//!
//! Pixel rows are stored top to bottom, cells in native byte order. A window
//! decode issues one range read per band per window row, so it never touches
//! pixels outside the window.

use crate::source::ByteSource;
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use tessera_core::{CellType, CodecError, Crs, Extent, GridBounds, MultibandTile, Tile};
use thiserror::Error;

/// Header of a raster plus the source it was read from
#[derive(Clone)]
pub struct RasterInfo {
    /// Width in pixels
    pub cols: u32,
    /// Height in pixels
    pub rows: u32,
    /// Width of one native segment
    pub seg_cols: u32,
    /// Height of one native segment
    pub seg_rows: u32,
    /// Number of bands
    pub band_count: usize,
    /// Cell type of every band
    pub cell_type: CellType,
    /// Embedded coordinate system
    pub crs: Crs,
    /// Map footprint of the whole raster
    pub extent: Extent,
    /// Header tags
    pub tags: BTreeMap<String, String>,
    /// Where pixel data starts in the source (codec specific)
    pub data_offset: u64,
    /// Source the header was decoded from
    pub source: ByteSource,
}

impl RasterInfo {
    /// The whole pixel grid, `None` for an empty raster
    pub fn grid(&self) -> Option<GridBounds> {
        GridBounds::full(self.cols, self.rows)
    }

    /// Check that `window` is well formed and lies inside the raster
    pub fn contains_window(&self, window: &GridBounds) -> bool {
        window.is_well_formed() && window.within(self.cols, self.rows)
    }

    /// Map footprint of `window`
    pub fn window_extent(&self, window: &GridBounds) -> Extent {
        self.extent.window_extent(self.cols, self.rows, window)
    }
}

impl fmt::Debug for RasterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterInfo")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("seg_cols", &self.seg_cols)
            .field("seg_rows", &self.seg_rows)
            .field("band_count", &self.band_count)
            .field("cell_type", &self.cell_type)
            .field("crs", &self.crs)
            .field("extent", &self.extent)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Decoder for one raster format
///
/// Only [`decode_header`](TileCodec::decode_header) and
/// [`decode_window_from_info`](TileCodec::decode_window_from_info) are
/// required; the whole-raster and single-window decodes default to them.
pub trait TileCodec: Send + Sync {
    /// Parse the raster header
    fn decode_header(&self, source: ByteSource) -> Result<RasterInfo, CodecError>;

    /// Decode `window` of a raster whose header was already parsed
    fn decode_window_from_info(
        &self,
        info: &RasterInfo,
        window: &GridBounds,
    ) -> Result<MultibandTile, CodecError>;

    /// Decode the whole raster
    fn decode_full(&self, source: ByteSource) -> Result<MultibandTile, CodecError> {
        let info = self.decode_header(source)?;
        let grid = info.grid().ok_or(RawCodecError::EmptyRaster)?;
        self.decode_window_from_info(&info, &grid)
    }

    /// Decode one window
    fn decode_window(
        &self,
        source: ByteSource,
        window: &GridBounds,
    ) -> Result<MultibandTile, CodecError> {
        let info = self.decode_header(source)?;
        self.decode_window_from_info(&info, window)
    }
}

/// Errors raised by [`RawCodec`]
#[derive(Debug, Error)]
pub enum RawCodecError {
    /// Source does not start with the raw magic
    #[error("not a raw raster: bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// Header JSON is unreadable
    #[error("bad raw header: {0}")]
    Header(#[from] serde_json::Error),

    /// Pixel data shorter than the header promises
    #[error("raw raster truncated: expected {expected} bytes, source has {actual}")]
    Truncated {
        /// Bytes the header promises
        expected: u64,
        /// Bytes available
        actual: u64,
    },

    /// Window outside the raster
    #[error("window {window} outside {cols}x{rows} raster")]
    WindowOutside {
        /// Requested window
        window: GridBounds,
        /// Raster width
        cols: u32,
        /// Raster height
        rows: u32,
    },

    /// Raster has no pixels
    #[error("raster has no pixels")]
    EmptyRaster,

    /// Band buffers passed to the encoder do not match the header
    #[error("band mismatch: {0}")]
    BandMismatch(String),

    /// Range read failed
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Header of a raw raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHeader {
    /// Width in pixels
    pub cols: u32,
    /// Height in pixels
    pub rows: u32,
    /// Native segment width
    pub seg_cols: u32,
    /// Native segment height
    pub seg_rows: u32,
    /// Number of bands
    pub band_count: usize,
    /// Cell type of every band
    pub cell_type: CellType,
    /// Coordinate system
    pub crs: Crs,
    /// Map footprint
    pub extent: Extent,
    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl RawHeader {
    fn band_bytes(&self) -> u64 {
        u64::from(self.cols) * u64::from(self.rows) * self.cell_type.bytes() as u64
    }
}

/// Reference codec for the raw band-sequential format
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl RawCodec {
    /// Leading magic bytes
    pub const MAGIC: [u8; 4] = *b"TSRW";

    /// Encode `bands` under `header`
    pub fn encode(header: &RawHeader, bands: &[Tile]) -> Result<Vec<u8>, CodecError> {
        use tessera_core::CellGrid;

        if bands.len() != header.band_count {
            return Err(RawCodecError::BandMismatch(format!(
                "header declares {} bands, got {}",
                header.band_count,
                bands.len()
            ))
            .into());
        }
        for band in bands {
            if band.cols() != header.cols
                || band.rows() != header.rows
                || band.cell_type() != header.cell_type
            {
                return Err(RawCodecError::BandMismatch(format!(
                    "band is {}x{} {}, header is {}x{} {}",
                    band.cols(),
                    band.rows(),
                    band.cell_type(),
                    header.cols,
                    header.rows,
                    header.cell_type
                ))
                .into());
            }
        }

        let json = serde_json::to_vec(header).map_err(RawCodecError::Header)?;
        let mut out = Vec::with_capacity(8 + json.len() + header.band_bytes() as usize * bands.len());
        out.extend_from_slice(&Self::MAGIC);
        let mut len = [0u8; 4];
        BigEndian::write_u32(&mut len, json.len() as u32);
        out.extend_from_slice(&len);
        out.extend_from_slice(&json);
        for band in bands {
            out.extend_from_slice(band.as_bytes());
        }
        Ok(out)
    }
}

impl TileCodec for RawCodec {
    fn decode_header(&self, source: ByteSource) -> Result<RasterInfo, CodecError> {
        let prefix = source.read_range(0, 8).map_err(RawCodecError::Io)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&prefix[..4]);
        if magic != Self::MAGIC {
            return Err(RawCodecError::BadMagic(magic).into());
        }
        let header_len = BigEndian::read_u32(&prefix[4..8]) as usize;
        let json = source.read_range(8, header_len).map_err(RawCodecError::Io)?;
        let header: RawHeader = serde_json::from_slice(&json).map_err(RawCodecError::Header)?;

        let data_offset = 8 + header_len as u64;
        let expected = data_offset + header.band_bytes() * header.band_count as u64;
        if source.len() < expected {
            return Err(RawCodecError::Truncated {
                expected,
                actual: source.len(),
            }
            .into());
        }

        Ok(RasterInfo {
            cols: header.cols,
            rows: header.rows,
            seg_cols: header.seg_cols,
            seg_rows: header.seg_rows,
            band_count: header.band_count,
            cell_type: header.cell_type,
            crs: header.crs,
            extent: header.extent,
            tags: header.tags,
            data_offset,
            source: Arc::clone(&source),
        })
    }

    fn decode_window_from_info(
        &self,
        info: &RasterInfo,
        window: &GridBounds,
    ) -> Result<MultibandTile, CodecError> {
        if !info.contains_window(window) {
            return Err(RawCodecError::WindowOutside {
                window: *window,
                cols: info.cols,
                rows: info.rows,
            }
            .into());
        }
        let cell = info.cell_type.bytes() as u64;
        let cols = u64::from(info.cols);
        let rows = u64::from(info.rows);
        let row_bytes = window.width() as usize * cell as usize;

        let mut bands = Vec::with_capacity(info.band_count);
        for band in 0..info.band_count as u64 {
            let mut data = Vec::with_capacity(row_bytes * window.height() as usize);
            for row in window.row_min..=window.row_max {
                let cell_index = (band * rows + u64::from(row)) * cols + u64::from(window.col_min);
                let bytes = info
                    .source
                    .read_range(info.data_offset + cell_index * cell, row_bytes)
                    .map_err(RawCodecError::Io)?;
                data.extend_from_slice(&bytes);
            }
            bands.push(Tile::new(window.width(), window.height(), info.cell_type, data)?);
        }
        Ok(MultibandTile::new(bands)?)
    }
}
