//! Decoded pixel buffers
//!
//! Tiles are opaque to the layer store: it only needs their shape
//! (columns, rows, bands, cell type) to describe a layer, and serde to
//! persist them. Pixel contents are never interpreted.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    /// Unsigned 8-bit
    U8,
    /// Signed 8-bit
    I8,
    /// Unsigned 16-bit
    U16,
    /// Signed 16-bit
    I16,
    /// Unsigned 32-bit
    U32,
    /// Signed 32-bit
    I32,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}

impl CellType {
    /// Size of one cell in bytes
    pub fn bytes(&self) -> usize {
        match self {
            CellType::U8 | CellType::I8 => 1,
            CellType::U16 | CellType::I16 => 2,
            CellType::U32 | CellType::I32 | CellType::F32 => 4,
            CellType::F64 => 8,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellType::U8 => "uint8",
            CellType::I8 => "int8",
            CellType::U16 => "uint16",
            CellType::I16 => "int16",
            CellType::U32 => "uint32",
            CellType::I32 => "int32",
            CellType::F32 => "float32",
            CellType::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// Shape of a decoded raster value
pub trait CellGrid {
    /// Width in pixels
    fn cols(&self) -> u32;
    /// Height in pixels
    fn rows(&self) -> u32;
    /// Number of bands
    fn band_count(&self) -> usize;
    /// Cell type shared by all bands
    fn cell_type(&self) -> CellType;
}

/// Values a layer can store
pub trait TileValue:
    CellGrid + Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> TileValue for T where
    T: CellGrid + Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Single-band pixel buffer, row-major
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    cols: u32,
    rows: u32,
    cell_type: CellType,
    data: Vec<u8>,
}

impl Tile {
    /// Wrap a row-major buffer, checking its length against the shape
    pub fn new(cols: u32, rows: u32, cell_type: CellType, data: Vec<u8>) -> Result<Self> {
        let expected = cols as usize * rows as usize * cell_type.bytes();
        if data.len() != expected {
            return Err(Error::InvalidTile(format!(
                "{}x{} {} tile needs {} bytes, got {}",
                cols,
                rows,
                cell_type,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            cols,
            rows,
            cell_type,
            data,
        })
    }

    /// Tile of zeroed cells
    pub fn empty(cols: u32, rows: u32, cell_type: CellType) -> Self {
        Self {
            cols,
            rows,
            cell_type,
            data: vec![0; cols as usize * rows as usize * cell_type.bytes()],
        }
    }

    /// Raw bytes of one cell
    pub fn cell(&self, col: u32, row: u32) -> Option<&[u8]> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let size = self.cell_type.bytes();
        let start = (row as usize * self.cols as usize + col as usize) * size;
        self.data.get(start..start + size)
    }

    /// Row-major cell bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl CellGrid for Tile {
    fn cols(&self) -> u32 {
        self.cols
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn band_count(&self) -> usize {
        1
    }

    fn cell_type(&self) -> CellType {
        self.cell_type
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("cell_type", &self.cell_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Stack of same-shaped bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultibandTile {
    bands: Vec<Tile>,
}

impl MultibandTile {
    /// Stack bands; all must share shape and cell type
    pub fn new(bands: Vec<Tile>) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| Error::InvalidTile("multiband tile needs at least one band".into()))?;
        let (cols, rows, cell_type) = (first.cols, first.rows, first.cell_type);
        if let Some((i, _)) = bands
            .iter()
            .enumerate()
            .find(|(_, b)| b.cols != cols || b.rows != rows || b.cell_type != cell_type)
        {
            return Err(Error::InvalidTile(format!(
                "band {} does not match {}x{} {}",
                i, cols, rows, cell_type
            )));
        }
        Ok(Self { bands })
    }

    /// Band by position
    pub fn band(&self, index: usize) -> Option<&Tile> {
        self.bands.get(index)
    }

    /// All bands
    pub fn bands(&self) -> &[Tile] {
        &self.bands
    }

    /// Take the bands
    pub fn into_bands(self) -> Vec<Tile> {
        self.bands
    }
}

impl CellGrid for MultibandTile {
    fn cols(&self) -> u32 {
        self.bands.first().map_or(0, |b| b.cols)
    }

    fn rows(&self) -> u32 {
        self.bands.first().map_or(0, |b| b.rows)
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn cell_type(&self) -> CellType {
        self.bands.first().map_or(CellType::U8, |b| b.cell_type)
    }
}
