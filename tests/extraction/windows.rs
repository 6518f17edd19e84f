//! Window planning and windowed reads

use crate::common::*;
use std::collections::BTreeMap;
use tessera::prelude::*;
use tessera_core::ProjectedExtent;
use tessera_raster::{plan_geometry, ExtentRasterizer, MultibandReader, RasterizeOptions};

/// Pixel value the fixture raster holds at (col, row) of band `band`
fn expected_pixel(cols: u32, col: u32, row: u32, band: u32) -> u8 {
    (row * cols + col + band) as u8
}

fn assert_window_pixels(tile: &Tile, window: &GridBounds, cols: u32, band: u32) {
    assert_eq!(tile.cols(), window.width());
    assert_eq!(tile.rows(), window.height());
    for (col, row) in window.coords() {
        let cell = tile.cell(col - window.col_min, row - window.row_min).unwrap();
        assert_eq!(cell, &[expected_pixel(cols, col, row, band)][..], "pixel ({}, {})", col, row);
    }
}

// =============================================================================
// PLANNING
// =============================================================================

#[test]
fn test_segment_aligned_plan_covers_raster_once() {
    let windows = WindowPlanner::new(16).with_segments(8, 8).plan(40, 24);

    assert_eq!(
        windows,
        vec![
            GridBounds::new(0, 0, 15, 15),
            GridBounds::new(16, 0, 31, 15),
            GridBounds::new(32, 0, 39, 15),
            GridBounds::new(0, 16, 15, 23),
            GridBounds::new(16, 16, 31, 23),
            GridBounds::new(32, 16, 39, 23),
        ]
    );
}

#[test]
fn test_window_between_one_and_two_segments_uses_one_segment() {
    let windows = WindowPlanner::new(12).with_segments(8, 8).plan(24, 16);
    assert_eq!(windows.len(), 6);
    assert!(windows.iter().all(|w| w.width() == 8 && w.height() == 8));
}

#[test]
fn test_whole_plan_is_one_window() {
    assert_eq!(WindowPlanner::whole().plan(40, 24), vec![GridBounds::new(0, 0, 39, 23)]);
}

#[test]
fn test_geometry_plan_keeps_touched_windows() {
    let (header, _) = raster(32, 32, 1, BTreeMap::new());
    // North-west quarter of the raster, plus a sliver of the next window east
    let aoi = Extent::new(
        header.extent.xmin,
        header.extent.ymax - 160.0,
        header.extent.xmin + 170.0,
        header.extent.ymax,
    );

    let windows = plan_geometry(
        32,
        32,
        8,
        &header.extent,
        8,
        8,
        &aoi,
        &ExtentRasterizer,
        &RasterizeOptions::default(),
    );
    assert_eq!(windows.len(), 6);
    assert!(windows.contains(&GridBounds::new(16, 8, 23, 15)));

    let centers_only = plan_geometry(
        32,
        32,
        8,
        &header.extent,
        8,
        8,
        &aoi,
        &ExtentRasterizer,
        &RasterizeOptions { all_touched: false },
    );
    assert_eq!(centers_only.len(), 4);
}

// =============================================================================
// READS
// =============================================================================

#[test]
fn test_windowed_reads_match_raster_pixels() {
    let (header, bytes) = raster(40, 24, 1, BTreeMap::new());
    let reader = SinglebandReader::new(RawCodec);
    let source = source(bytes);
    let info = reader.read_info(source).unwrap();
    let windows = WindowPlanner::new(16).with_segments(info.seg_cols, info.seg_rows).plan(info.cols, info.rows);
    let options = ReadOptions::default();

    let decoded: Vec<(ProjectedExtent, Tile)> = reader
        .read_windows(windows.clone(), &info, &options)
        .collect::<Result<_>>()
        .unwrap();

    assert_eq!(decoded.len(), windows.len());
    for ((footprint, tile), window) in decoded.iter().zip(&windows) {
        assert_eq!(footprint.extent, header.extent.window_extent(40, 24, window));
        assert_eq!(footprint.crs, header.crs);
        assert_window_pixels(tile, window, 40, 0);
    }
}

#[test]
fn test_windows_outside_raster_are_dropped() {
    let (_, bytes) = raster(16, 16, 1, BTreeMap::new());
    let reader = SinglebandReader::new(RawCodec);
    let info = reader.read_info(source(bytes)).unwrap();
    let windows = vec![GridBounds::new(0, 0, 7, 7), GridBounds::new(12, 12, 19, 19), GridBounds::new(8, 8, 15, 15)];

    let decoded: Vec<(ProjectedExtent, Tile)> = reader
        .read_windows(windows, &info, &ReadOptions::default())
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(decoded.len(), 2);
}

#[test]
fn test_single_window_read_checks_bounds() {
    let (_, bytes) = raster(16, 16, 1, BTreeMap::new());
    let reader = SinglebandReader::new(RawCodec);
    let options = ReadOptions::default();

    let (_, tile) = reader
        .read_window(source(bytes.clone()), GridBounds::new(3, 5, 9, 6), &options)
        .unwrap();
    assert_window_pixels(&tile, &GridBounds::new(3, 5, 9, 6), 16, 0);

    let err = reader
        .read_window(source(bytes), GridBounds::new(10, 10, 16, 12), &options)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidWindow { .. }));
}

#[test]
fn test_multiband_read_with_crs_override() {
    let (header, bytes) = raster(16, 8, 3, BTreeMap::new());
    let reader = MultibandReader::new(RawCodec);
    let options = ReadOptions::default().with_crs(Crs::WEB_MERCATOR);

    let (footprint, tile) = reader.read_fully(source(bytes), &options).unwrap();

    assert_eq!(footprint.crs, Crs::WEB_MERCATOR);
    assert_eq!(footprint.extent, header.extent);
    assert_eq!(tile.band_count(), 3);
    let whole = GridBounds::new(0, 0, 15, 7);
    for (b, band) in tile.bands().iter().enumerate() {
        assert_window_pixels(band, &whole, 16, b as u32);
    }
}

#[test]
fn test_reads_from_file() {
    let (_, bytes) = raster(24, 24, 1, BTreeMap::new());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.tsrw");
    std::fs::write(&path, &bytes).unwrap();

    let reader = SinglebandReader::new(RawCodec);
    let file = FileRangeReader::open(&path).unwrap().into_source();
    let in_memory = source(bytes);
    let window = GridBounds::new(8, 16, 15, 23);

    let (_, from_file) = reader.read_window(file, window, &ReadOptions::default()).unwrap();
    let (_, from_memory) = reader.read_window(in_memory, window, &ReadOptions::default()).unwrap();
    assert_eq!(from_file, from_memory);
    assert_window_pixels(&from_file, &window, 24, 0);
}
