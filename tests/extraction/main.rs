//! Extraction Integration Tests
//!
//! Raster window planning and windowed reads through the public API, and
//! ingest of keyed tiles into catalog layers.
//!
//! ```bash
//! cargo test --test extraction
//! ```

#[path = "../common/mod.rs"]
mod common;

mod ingest;
mod windows;
