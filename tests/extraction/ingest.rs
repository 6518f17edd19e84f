//! Raster ingest into catalog layers

use crate::common::*;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use tessera::prelude::*;

fn acquired(value: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("TIFFTAG_DATETIME".to_string(), value.to_string())])
}

#[test]
fn test_ingest_tiles_a_raster_into_a_layer() {
    let catalog = Catalog::builder().max_window(8).open().unwrap();
    let (header, bytes) = raster(32, 24, 1, BTreeMap::new());
    let layout = LayoutDefinition::for_raster(header.extent, header.cols, header.rows, 8);
    let reader = SinglebandReader::new(RawCodec);
    let layer = LayerId::new("scene", 12);

    let progress = catalog
        .ingest(&reader, layout.clone())
        .write::<SpatialKey>(source(bytes.clone()), &catalog.writer(), &layer, KeyIndexMethod::ZCurve, WriteMode::Create)
        .unwrap();

    assert_eq!(progress.records_written, 12);
    let meta = catalog.metadata(&layer).unwrap();
    assert_eq!(meta.header.layout, layout);
    assert_eq!(meta.header.crs, header.crs);
    assert_eq!(meta.header.cell_type, CellType::U8);
    assert_eq!(
        meta.key_bounds::<SpatialKey>().unwrap(),
        KeyBounds::new(SpatialKey::new(0, 0), SpatialKey::new(3, 2))
    );

    // Key (2, 1) holds the window starting at pixel (16, 8)
    let (_, expected) = reader
        .read_window(source(bytes), GridBounds::new(16, 8, 23, 15), &ReadOptions::default())
        .unwrap();
    let stored: Option<Tile> = catalog.reader().read_key(&layer, &SpatialKey::new(2, 1)).unwrap();
    assert_eq!(stored, Some(expected));
}

#[test]
fn test_parallel_ingest_matches_sequential() {
    init_tracing();
    let (header, bytes) = raster(64, 40, 1, BTreeMap::new());
    let layout = LayoutDefinition::for_raster(header.extent, header.cols, header.rows, 8);
    let reader = SinglebandReader::new(RawCodec);
    let ingest = Ingest::new(&reader, layout).with_planner(WindowPlanner::new(8));

    let sequential: Vec<(SpatialKey, Tile)> = ingest.run(source(bytes.clone())).unwrap();
    let parallel: Vec<(SpatialKey, Tile)> = ingest.run_parallel(source(bytes), 4).unwrap();

    assert_eq!(sequential.len(), 40);
    assert_eq!(parallel, sequential);
}

#[test]
fn test_temporal_ingest_into_space_time_layer() {
    let catalog = Catalog::builder().max_window(16).open().unwrap();
    let reader = TemporalSinglebandReader::new(RawCodec);
    let layer = LayerId::new("series", 10);
    let days = ["2023:05:01 10:00:00", "2023:05:02 10:00:00", "2023:05:03 10:00:00"];

    let mut records: Vec<(SpaceTimeKey, Tile)> = Vec::new();
    let mut layer_header = None;
    for day in days {
        let (header, bytes) = raster(32, 32, 1, acquired(day));
        let layout = LayoutDefinition::for_raster(header.extent, header.cols, header.rows, 16);
        records.extend(catalog.ingest(&reader, layout.clone()).run_parallel(source(bytes), 2).unwrap());
        layer_header = Some(LayerHeader::new(header.crs, header.cell_type, 1, layout));
    }
    catalog
        .writer()
        .write(&layer, layer_header.unwrap(), KeyIndexMethod::by_days(1), records, WriteMode::Create)
        .unwrap();

    let second = Utc.with_ymd_and_hms(2023, 5, 2, 10, 0, 0).unwrap().timestamp_millis();
    let query = KeyBounds::new(SpaceTimeKey::new(0, 0, second), SpaceTimeKey::new(1, 1, second));
    let found: Vec<(SpaceTimeKey, Tile)> = catalog.reader().read(&layer, &query).unwrap();

    assert_eq!(found.len(), 4);
    assert!(found.iter().all(|(k, _)| k.instant == second));
    let all: Vec<(SpaceTimeKey, Tile)> = catalog.reader().read_all(&layer).unwrap();
    assert_eq!(all.len(), 12);
}

#[test]
fn test_appending_past_space_time_bounds_is_refused() {
    let catalog = Catalog::builder().max_window(16).open().unwrap();
    let reader = TemporalSinglebandReader::new(RawCodec);
    let layer = LayerId::new("series", 10);

    let (header, bytes) = raster(32, 32, 1, acquired("2023:05:01 10:00:00"));
    let layout = LayoutDefinition::for_raster(header.extent, header.cols, header.rows, 16);
    let ingest = catalog.ingest(&reader, layout);
    ingest
        .write::<SpaceTimeKey>(source(bytes), &catalog.writer(), &layer, KeyIndexMethod::by_days(1), WriteMode::Create)
        .unwrap();

    let (_, later) = raster(32, 32, 1, acquired("2023:06:01 10:00:00"));
    let err = ingest
        .write::<SpaceTimeKey>(source(later), &catalog.writer(), &layer, KeyIndexMethod::by_days(1), WriteMode::Append)
        .unwrap_err();
    assert!(matches!(err, Error::KeyOutOfBounds { .. }));
    let all: Vec<(SpaceTimeKey, Tile)> = catalog.reader().read_all(&layer).unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn test_custom_time_tag_and_format() {
    let (header, bytes) = raster(16, 16, 1, BTreeMap::from([("ACQUIRED".to_string(), "2021-11-30".to_string())]));
    let layout = LayoutDefinition::for_raster(header.extent, header.cols, header.rows, 16);
    let reader = TemporalSinglebandReader::new(RawCodec);
    let options = ReadOptions::default()
        .with_time_tag("ACQUIRED")
        .with_time_format("%Y-%m-%d");

    let records: Vec<(SpaceTimeKey, Tile)> = Ingest::new(&reader, layout)
        .with_options(options)
        .run(source(bytes))
        .unwrap();

    let midnight = Utc.with_ymd_and_hms(2021, 11, 30, 0, 0, 0).unwrap().timestamp_millis();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, SpaceTimeKey::new(0, 0, midnight));
}

#[test]
fn test_missing_or_malformed_time_tag() {
    let reader = TemporalSinglebandReader::new(RawCodec);

    let (header, bytes) = raster(16, 16, 1, BTreeMap::new());
    let layout = LayoutDefinition::for_raster(header.extent, header.cols, header.rows, 16);
    let err = Ingest::new(&reader, layout.clone())
        .run::<SpaceTimeKey>(source(bytes))
        .unwrap_err();
    assert!(matches!(err, Error::MissingTag { .. }));

    let (_, bytes) = raster(16, 16, 1, acquired("yesterday"));
    let err = Ingest::new(&reader, layout)
        .run::<SpaceTimeKey>(source(bytes))
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
}

#[test]
fn test_ingest_onto_existing_layer_is_refused() {
    let catalog = Catalog::ephemeral().unwrap();
    let (header, bytes) = raster(16, 16, 1, BTreeMap::new());
    let layout = LayoutDefinition::for_raster(header.extent, header.cols, header.rows, 8);
    let reader = SinglebandReader::new(RawCodec);
    let layer = LayerId::new("scene", 1);
    let ingest = catalog.ingest(&reader, layout);

    ingest
        .write::<SpatialKey>(source(bytes.clone()), &catalog.writer(), &layer, KeyIndexMethod::ZCurve, WriteMode::Create)
        .unwrap();
    let err = ingest
        .write::<SpatialKey>(source(bytes), &catalog.writer(), &layer, KeyIndexMethod::ZCurve, WriteMode::Create)
        .unwrap_err();
    assert!(matches!(err, Error::LayerExists { .. }));
}
