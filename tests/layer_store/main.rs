//! Layer Store Integration Tests
//!
//! Exercises the catalog end to end: layer writes and queries, composite
//! operations, file-backed persistence with reindex recovery, and
//! concurrent access.
//!
//! ```bash
//! cargo test --test layer_store
//! cargo test --test layer_store composite::
//! ```

#[path = "../common/mod.rs"]
mod common;

mod composite;
mod crud;
mod concurrency;
mod persistence;
