//! Sorted tile table backends for Tessera layers
//!
//! Layers are stored as tables of `u64 -> bytes` records, kept in ascending
//! identifier order so an index range becomes a single ordered scan. A
//! separate metadata table holds named documents (layer attributes and
//! reindex markers).
//!
//! - [`MemoryBackend`]: DashMap of per-table `BTreeMap`s, nothing persisted
//! - [`FileBackend`]: the same in-memory image, rebuilt on open by replaying
//!   one append-only log per table
//!
//! Both implement [`Backend`]; the engine only ever talks to the trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod durability;
pub mod file;
pub mod format;
pub mod sharded;

pub use backend::{Backend, StorageError, StorageResult};
pub use durability::SyncMode;
pub use file::FileBackend;
pub use sharded::{MemoryBackend, Table};
