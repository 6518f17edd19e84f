//! Shared fixtures for the integration suites
//!
//! Each test builds its own catalog; file-backed catalogs live in a
//! temporary directory that is removed when the returned guard drops.

#![allow(dead_code)]

use std::collections::BTreeMap;
use tempfile::TempDir;
use tessera::prelude::*;

/// Install a fmt subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory catalog
pub fn memory_catalog() -> Catalog {
    init_tracing();
    Catalog::ephemeral().expect("ephemeral catalog")
}

/// File-backed catalog in a fresh temporary directory
pub fn file_catalog() -> (TempDir, Catalog) {
    init_tracing();
    let dir = tempfile::tempdir().expect("temp dir");
    let catalog = reopen(&dir);
    (dir, catalog)
}

/// Open the catalog in `dir` again, running recovery
pub fn reopen(dir: &TempDir) -> Catalog {
    Catalog::builder()
        .path(dir.path())
        .sync(SyncMode::None)
        .open()
        .expect("file catalog")
}

// ============================================================================
// Layer fixtures
// ============================================================================

/// 16x16 grid of 4x4-pixel byte tiles over a 64x64 extent
pub fn header() -> LayerHeader {
    let layout = LayoutDefinition::new(Extent::new(0.0, 0.0, 64.0, 64.0), 4, 4, 16, 16);
    LayerHeader::new(Crs::WGS84, CellType::U8, 1, layout)
}

/// 4x4 byte tile filled with `fill`
pub fn tile(fill: u8) -> Tile {
    Tile::new(4, 4, CellType::U8, vec![fill; 16]).expect("tile")
}

/// One tile per key of a `cols x rows` grid, distinct per key
pub fn grid(cols: u32, rows: u32) -> Vec<(SpatialKey, Tile)> {
    let mut records = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            records.push((SpatialKey::new(col, row), tile((row * cols + col) as u8)));
        }
    }
    records
}

/// Tiles at columns 0..4 of row 2, one set per instant
pub fn series(instants: &[i64]) -> Vec<(SpaceTimeKey, Tile)> {
    let mut records = Vec::new();
    for (i, instant) in instants.iter().enumerate() {
        for col in 0..4 {
            records.push((SpaceTimeKey::new(col, 2, *instant), tile((i * 10) as u8 + col as u8)));
        }
    }
    records
}

/// Records sorted by key
pub fn sorted<K: Ord, V>(mut records: Vec<(K, V)>) -> Vec<(K, V)> {
    records.sort_by(|a, b| a.0.cmp(&b.0));
    records
}

// ============================================================================
// Raster fixtures
// ============================================================================

/// Raw `cols x rows` byte raster with 8x8 segments over a 10 m grid
///
/// Band `b` holds `(row * cols + col + b) as u8` at each pixel.
pub fn raster(cols: u32, rows: u32, bands: usize, tags: BTreeMap<String, String>) -> (RawHeader, Vec<u8>) {
    let header = RawHeader {
        cols,
        rows,
        seg_cols: 8,
        seg_rows: 8,
        band_count: bands,
        cell_type: CellType::U8,
        crs: Crs::Epsg(32618),
        extent: Extent::new(500_000.0, 4_000_000.0, 500_000.0 + 10.0 * cols as f64, 4_000_000.0 + 10.0 * rows as f64),
        tags,
    };
    let bands: Vec<Tile> = (0..bands)
        .map(|b| {
            let data = (0..rows)
                .flat_map(|row| (0..cols).map(move |col| (row * cols + col) as usize + b))
                .map(|v| v as u8)
                .collect();
            Tile::new(cols, rows, CellType::U8, data).expect("band")
        })
        .collect();
    let bytes = RawCodec::encode(&header, &bands).expect("encode");
    (header, bytes)
}

/// In-memory source over `bytes`
pub fn source(bytes: Vec<u8>) -> ByteSource {
    BytesReader::new(bytes).into_source()
}
