//! Core types for Tessera
//!
//! This crate defines the vocabulary shared by every other crate:
//! - [`GridBounds`], [`Extent`], [`Crs`]: pixel-space and map-space rectangles
//! - [`SpatialKey`], [`SpaceTimeKey`], [`KeyBounds`]: tile addressing
//! - [`Tile`], [`MultibandTile`]: opaque decoded pixel buffers
//! - [`LayerId`], [`LayerHeader`], [`LayoutDefinition`]: layer description
//! - [`Error`]: the error taxonomy for extraction and layer operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod geometry;
pub mod key;
pub mod layout;
pub mod tile;
pub mod types;

pub use error::{CodecError, CompositeStage, Error, Result, WriteProgress};
pub use geometry::{Crs, Extent, GridBounds, ProjectedExtent, TemporalProjectedExtent};
pub use key::{KeyBounds, KeySpan, KeyType, LayerKey, SpaceTimeKey, SpatialKey};
pub use layout::{FootprintKey, LayoutDefinition};
pub use tile::{CellGrid, CellType, MultibandTile, Tile, TileValue};
pub use types::{LayerHeader, LayerId};
