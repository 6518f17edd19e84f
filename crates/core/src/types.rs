//! Layer identity and description
//!
//! - [`LayerId`]: layer name plus pyramid level
//! - [`LayerHeader`]: what a layer's tiles look like and where they sit

use crate::geometry::Crs;
use crate::layout::LayoutDefinition;
use crate::tile::CellType;
use serde::{Deserialize, Serialize};

/// Identifier of a layer: name plus zoom (pyramid) level
///
/// Layers are ordered by name, then zoom.
///
/// # Examples
///
/// ```
/// use tessera_core::LayerId;
///
/// let id = LayerId::new("landsat", 12);
/// assert_eq!(id.to_string(), "landsat:12");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId {
    /// Layer name
    pub name: String,
    /// Pyramid level
    pub zoom: u32,
}

impl LayerId {
    /// Longest table name a registered layer may have
    ///
    /// File-backed storage keeps one log per table, named by the table
    /// name's hex encoding, and must stay under the 255 byte file name limit.
    pub const MAX_TABLE_NAME_LEN: usize = 120;

    /// Create a layer identifier
    pub fn new(name: impl Into<String>, zoom: u32) -> Self {
        Self {
            name: name.into(),
            zoom,
        }
    }

    /// Same name at another zoom level
    pub fn at_zoom(&self, zoom: u32) -> Self {
        Self::new(self.name.clone(), zoom)
    }

    /// Name of the tile table holding this layer's records
    pub fn table_name(&self) -> String {
        format!("{}:{}", self.name, self.zoom)
    }

    /// Parse the output of [`LayerId::table_name`]
    pub fn from_table_name(table: &str) -> Option<Self> {
        let (name, zoom) = table.rsplit_once(':')?;
        let zoom = zoom.parse().ok()?;
        Some(Self::new(name, zoom))
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.zoom)
    }
}

/// Schema of a layer's tiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerHeader {
    /// Coordinate system of the layout extent
    pub crs: Crs,
    /// Cell type of every band
    pub cell_type: CellType,
    /// Bands per tile
    pub band_count: usize,
    /// Tiling grid
    pub layout: LayoutDefinition,
}

impl LayerHeader {
    /// Create a header
    pub fn new(crs: Crs, cell_type: CellType, band_count: usize, layout: LayoutDefinition) -> Self {
        Self {
            crs,
            cell_type,
            band_count,
            layout,
        }
    }
}
