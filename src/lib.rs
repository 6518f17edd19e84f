//! # Tessera
//!
//! Windowed raster extraction and key-indexed tile layer storage.
//!
//! Tessera cuts rasters into segment-aligned windows, decodes each window
//! into a tile keyed by its footprint, and stores the tiles as layers whose
//! records are laid out along a space-filling curve, so a rectangular key
//! query becomes a handful of ordered range scans.
//!
//! ## Quick Start
//!
//! ```
//! use tessera::prelude::*;
//!
//! // A 16x16 raster, one band of bytes
//! let header = RawHeader {
//!     cols: 16,
//!     rows: 16,
//!     seg_cols: 8,
//!     seg_rows: 8,
//!     band_count: 1,
//!     cell_type: CellType::U8,
//!     crs: Crs::WGS84,
//!     extent: Extent::new(0.0, 0.0, 16.0, 16.0),
//!     tags: Default::default(),
//! };
//! let band = Tile::new(16, 16, CellType::U8, vec![7; 256]).unwrap();
//! let source = BytesReader::new(RawCodec::encode(&header, &[band]).unwrap()).into_source();
//!
//! // Ingest it as 8x8 tiles
//! let catalog = Catalog::builder().max_window(8).open().unwrap();
//! let reader = SinglebandReader::new(RawCodec);
//! let layout = LayoutDefinition::for_raster(header.extent, 16, 16, 8);
//! let layer = LayerId::new("scene", 1);
//! catalog
//!     .ingest(&reader, layout)
//!     .write::<SpatialKey>(source, &catalog.writer(), &layer, KeyIndexMethod::ZCurve, WriteMode::Create)
//!     .unwrap();
//!
//! // Query a key range
//! let query = KeyBounds::new(SpatialKey::new(0, 0), SpatialKey::new(1, 0));
//! let tiles: Vec<(SpatialKey, Tile)> = catalog.reader().read(&layer, &query).unwrap();
//! assert_eq!(tiles.len(), 2);
//! ```
//!
//! ## Crates
//!
//! - `tessera-core`: keys, extents, tiles, layouts and the error taxonomy
//! - `tessera-index`: key indexes mapping keys to 1-D identifiers
//! - `tessera-storage`: sorted tile table backends
//! - `tessera-raster`: window planning and windowed raster reads
//! - `tessera-engine`: layer reads, writes and composite operations

#![warn(missing_docs)]

mod catalog;
pub mod config;
pub mod prelude;

pub use catalog::{Catalog, CatalogBuilder};
pub use config::{CatalogConfig, IngestConfig, StorageConfig};
pub use tessera_core::{Error, Result};

pub use tessera_engine::{
    AttributeStore, LayerCopier, LayerDeleter, LayerMetadata, LayerMover, LayerReader,
    LayerReindexer, LayerUpdater, LayerWriter,
};
