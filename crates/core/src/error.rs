//! Error types for extraction and layer operations
//!
//! One enum covers both halves of the system so that composite operations
//! (copy, move, reindex) can wrap whatever failed underneath them without
//! losing the original cause.
//!
//! ## Taxonomy
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | MissingTag | temporal reads, timestamp tag absent |
//! | Parse | temporal reads, timestamp does not match the pattern |
//! | LayerNotFound | reads, updates, copies of an unknown layer |
//! | LayerExists | writes/copies onto an existing layer |
//! | AlreadyExists | attribute registration without overwrite |
//! | InvalidWindow | single-window reads with a malformed or out-of-raster window |
//! | PartialWrite | a write or composite operation failed midway |

use crate::geometry::GridBounds;
use crate::key::KeyType;
use crate::types::LayerId;
use std::fmt;
use thiserror::Error;

/// Opaque error produced by a tile codec.
///
/// Codec failures are carried through unchanged as the `source` of
/// [`Error::Codec`].
pub type CodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for Tessera operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Step of a write or composite operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeStage {
    /// Writing records into a layer
    Write,
    /// Copying records into the destination layer
    Copy,
    /// Deleting the source layer after a successful copy
    DeleteSource,
    /// Replacing a layer with its reindexed copy
    Reindex,
}

impl fmt::Display for CompositeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositeStage::Write => "write",
            CompositeStage::Copy => "copy",
            CompositeStage::DeleteSource => "delete-source",
            CompositeStage::Reindex => "reindex",
        };
        f.write_str(name)
    }
}

/// How far a write got before it failed
///
/// Buckets are written in ascending index order, so `last_index` is a
/// resume point: everything at or below it is durable in the target layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteProgress {
    /// Layer being written
    pub layer: LayerId,
    /// Index buckets fully written
    pub buckets_written: usize,
    /// Records contained in those buckets
    pub records_written: usize,
    /// Last index identifier written, `None` if nothing was written
    pub last_index: Option<u64>,
}

impl WriteProgress {
    /// Progress marker for a write that has not started
    pub fn new(layer: LayerId) -> Self {
        Self {
            layer,
            buckets_written: 0,
            records_written: 0,
            last_index: None,
        }
    }

    /// Record one more bucket written at `index`
    pub fn advance(&mut self, index: u64, records: usize) {
        self.buckets_written += 1;
        self.records_written += records;
        self.last_index = Some(index);
    }
}

impl fmt::Display for WriteProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_index {
            Some(idx) => write!(
                f,
                "{}: {} records in {} buckets, last index {}",
                self.layer, self.records_written, self.buckets_written, idx
            ),
            None => write!(f, "{}: nothing written", self.layer),
        }
    }
}

/// All Tessera errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Timestamp tag absent from the raster header
    #[error("missing tag: {tag}")]
    MissingTag {
        /// Tag that was looked up
        tag: String,
    },

    /// Timestamp tag value does not match the parse pattern
    #[error("cannot parse {value:?} with pattern {pattern:?}")]
    Parse {
        /// Raw tag value
        value: String,
        /// Pattern it was parsed with
        pattern: String,
    },

    /// Layer has no registered metadata
    #[error("layer not found: {layer}")]
    LayerNotFound {
        /// Missing layer
        layer: LayerId,
    },

    /// Layer already exists and the write did not ask to append or overwrite
    #[error("layer already exists: {layer}")]
    LayerExists {
        /// Existing layer
        layer: LayerId,
    },

    /// Attribute registration collided with an existing entry
    #[error("attributes already registered for {layer}")]
    AlreadyExists {
        /// Layer whose attributes exist
        layer: LayerId,
    },

    /// Window is malformed or does not lie inside the raster
    #[error("invalid window {window} for {cols}x{rows} raster")]
    InvalidWindow {
        /// Requested window
        window: GridBounds,
        /// Raster width in pixels
        cols: u32,
        /// Raster height in pixels
        rows: u32,
    },

    /// A write or composite operation failed after making visible changes
    #[error("{stage} failed at {progress}: {source}")]
    PartialWrite {
        /// Stage that failed
        stage: CompositeStage,
        /// Resume marker
        progress: WriteProgress,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Layer was written with another key shape
    #[error("layer {layer} holds {actual} keys, requested {expected}")]
    KeyTypeMismatch {
        /// Layer being accessed
        layer: LayerId,
        /// Key type requested by the caller
        expected: KeyType,
        /// Key type recorded in the layer metadata
        actual: KeyType,
    },

    /// A bounded key index cannot address the key
    #[error("key {key} outside index bounds {bounds}")]
    KeyOutOfBounds {
        /// Offending key
        key: String,
        /// Bounds of the index
        bounds: String,
    },

    /// A reindex of this layer was interrupted and has not been recovered
    #[error("reindex pending for layer {layer}")]
    ReindexPending {
        /// Layer with a pending reindex marker
        layer: LayerId,
    },

    /// Tile buffer inconsistent with its declared shape
    #[error("invalid tile: {0}")]
    InvalidTile(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure inside the tile codec
    #[error("codec error: {0}")]
    Codec(#[source] CodecError),

    /// Failure inside the storage backend
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Record or metadata encoding failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::LayerNotFound { .. })
    }

    /// Check if retrying the same call may succeed.
    ///
    /// Partial writes are retryable because every write step is
    /// last-write-wins per key.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::PartialWrite { .. } | Error::Storage(_) | Error::Io(_)
        )
    }

    /// Resume marker of a partial write, if this is one
    pub fn progress(&self) -> Option<&WriteProgress> {
        match self {
            Error::PartialWrite { progress, .. } => Some(progress),
            _ => None,
        }
    }

    /// Wrap `self` as a partial write at `stage`
    pub fn into_partial(self, stage: CompositeStage, progress: WriteProgress) -> Error {
        Error::PartialWrite {
            stage,
            progress,
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
