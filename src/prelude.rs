//! Convenient imports for Tessera.
//!
//! ```
//! use tessera::prelude::*;
//!
//! let catalog = Catalog::ephemeral().unwrap();
//! assert!(catalog.layers().unwrap().is_empty());
//! ```

// Entry points
pub use crate::catalog::{Catalog, CatalogBuilder};
pub use crate::config::CatalogConfig;

// Errors
pub use tessera_core::{CompositeStage, Error, Result, WriteProgress};

// Keys, geometry, tiles
pub use tessera_core::{
    CellGrid, CellType, Crs, Extent, GridBounds, KeyBounds, LayerHeader, LayerId, LayerKey,
    LayoutDefinition, MultibandTile, SpaceTimeKey, SpatialKey, Tile, TileValue,
};

// Indexing
pub use tessera_index::KeyIndexMethod;

// Layer operations
pub use tessera_engine::{Ingest, Recovery, WriteMode};

// Raster reads
pub use tessera_raster::{
    ByteSource, BytesReader, FileRangeReader, RasterWindowReader, RawCodec, RawHeader, ReadOptions,
    SinglebandReader, TemporalSinglebandReader, WindowPlanner,
};

// Storage
pub use tessera_storage::SyncMode;
