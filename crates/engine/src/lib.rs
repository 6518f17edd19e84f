//! Layer store protocol for Tessera
//!
//! This crate turns a [`Backend`](tessera_storage::Backend) into a keyed
//! tile layer store:
//! - [`AttributeStore`]: layer metadata, the source of truth every other
//!   operation resolves first
//! - [`LayerReader`], [`LayerWriter`], [`LayerUpdater`], [`LayerDeleter`]:
//!   per-layer CRUD
//! - [`LayerCopier`], [`LayerMover`], [`LayerReindexer`]: composite
//!   operations built from the CRUD primitives
//! - [`Ingest`]: windowed extraction from a raster into layer records
//!
//! ## Storage layout
//!
//! Each layer owns one backend table named after its [`LayerId`]. Records
//! are grouped into buckets by key index identifier; one bucket holds every
//! record whose key maps to that identifier, so index collisions lose
//! nothing. Metadata is JSON in the backend's metadata table.
//!
//! ## Consistency
//!
//! The unit of visible mutation is one bucket write. Writers never hold a
//! lock across buckets; concurrent writers to one layer are last-write-wins
//! per key. Composite operations are retryable rather than atomic and report
//! progress through [`Error::PartialWrite`](tessera_core::Error::PartialWrite).
//!
//! [`LayerId`]: tessera_core::LayerId

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attributes;
mod bucket;
pub mod copier;
pub mod deleter;
pub mod ingest;
pub mod mover;
pub mod reader;
pub mod reindexer;
pub mod updater;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use attributes::{AttributeStore, LayerMetadata, ReindexMarker, ReindexStage};
pub use copier::LayerCopier;
pub use deleter::LayerDeleter;
pub use ingest::Ingest;
pub use mover::LayerMover;
pub use reader::LayerReader;
pub use reindexer::{LayerReindexer, Recovery};
pub use updater::LayerUpdater;
pub use writer::{LayerWriter, WriteMode};
