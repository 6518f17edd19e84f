//! Copy, move and reindex through the catalog

use crate::common::*;
use tessera::prelude::*;

const HOUR: i64 = 3_600_000;

fn all(catalog: &Catalog, layer: &LayerId) -> Vec<(SpatialKey, Tile)> {
    sorted(catalog.reader().read_all(layer).unwrap())
}

// =============================================================================
// COPY
// =============================================================================

#[test]
fn test_copy_leaves_source_intact() {
    let catalog = memory_catalog();
    let (src, dst) = (LayerId::new("dem", 4), LayerId::new("dem-backup", 4));
    catalog.write(&src, header(), grid(8, 8)).unwrap();

    let progress = catalog.copier().copy(&src, &dst).unwrap();

    assert_eq!(progress.layer, dst);
    assert_eq!(progress.records_written, 64);
    assert_eq!(all(&catalog, &dst), all(&catalog, &src));
    assert_eq!(catalog.layers().unwrap(), vec![src.clone(), dst.clone()]);
    assert_eq!(catalog.metadata(&dst).unwrap().header, catalog.metadata(&src).unwrap().header);
}

#[test]
fn test_copies_are_independent() {
    let catalog = memory_catalog();
    let (src, dst) = (LayerId::new("dem", 4), LayerId::new("dem-copy", 4));
    catalog.write(&src, header(), grid(2, 2)).unwrap();
    catalog.copier().copy(&src, &dst).unwrap();

    catalog
        .updater()
        .update(&dst, vec![(SpatialKey::new(0, 0), tile(77))])
        .unwrap();

    let original: Option<Tile> = catalog.reader().read_key(&src, &SpatialKey::new(0, 0)).unwrap();
    assert_eq!(original, Some(tile(0)));
}

#[test]
fn test_copy_into_row_major_index() {
    let catalog = memory_catalog();
    let (src, dst) = (LayerId::new("dem", 4), LayerId::new("dem-rows", 4));
    catalog.write(&src, header(), grid(5, 7)).unwrap();

    catalog
        .copier()
        .copy_with(&src, &dst, KeyIndexMethod::RowMajor)
        .unwrap();

    assert_eq!(all(&catalog, &dst), all(&catalog, &src));
    assert_eq!(catalog.metadata(&dst).unwrap().index.method, KeyIndexMethod::RowMajor);
}

// =============================================================================
// MOVE
// =============================================================================

#[test]
fn test_move_renames_layer() {
    let catalog = memory_catalog();
    let (src, dst) = (LayerId::new("scratch", 2), LayerId::new("final", 2));
    catalog.write(&src, header(), grid(4, 3)).unwrap();

    catalog.mover().move_layer(&src, &dst).unwrap();

    assert_eq!(catalog.layers().unwrap(), vec![dst.clone()]);
    assert_eq!(all(&catalog, &dst), sorted(grid(4, 3)));
    assert!(catalog.reader().read_all::<SpatialKey, Tile>(&src).unwrap_err().is_not_found());
}

#[test]
fn test_move_of_missing_layer() {
    let catalog = memory_catalog();
    let err = catalog
        .mover()
        .move_layer(&LayerId::new("ghost", 0), &LayerId::new("other", 0))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(catalog.layers().unwrap().is_empty());
}

// =============================================================================
// REINDEX
// =============================================================================

#[test]
fn test_reindex_keeps_records_and_name() {
    let catalog = memory_catalog();
    let layer = LayerId::new("dem", 4);
    catalog.write(&layer, header(), grid(9, 9)).unwrap();
    let query = KeyBounds::new(SpatialKey::new(3, 3), SpatialKey::new(5, 8));
    let before: Vec<(SpatialKey, Tile)> = sorted(catalog.reader().read(&layer, &query).unwrap());

    catalog
        .reindexer()
        .reindex(&layer, KeyIndexMethod::RowMajor)
        .unwrap();

    let after: Vec<(SpatialKey, Tile)> = sorted(catalog.reader().read(&layer, &query).unwrap());
    assert_eq!(after, before);
    assert_eq!(after.len(), 18);
    assert_eq!(catalog.layers().unwrap(), vec![layer.clone()]);
    assert_eq!(catalog.metadata(&layer).unwrap().index.method, KeyIndexMethod::RowMajor);
    assert!(catalog.attributes().list_markers().unwrap().is_empty());
}

#[test]
fn test_reindex_space_time_layer_to_hourly_bins() {
    let catalog = memory_catalog();
    let layer = LayerId::new("ndvi", 7);
    let records = series(&[0, 5 * HOUR, 30 * HOUR]);
    catalog
        .writer()
        .write(&layer, header(), KeyIndexMethod::by_days(1), records.clone(), WriteMode::Create)
        .unwrap();

    catalog
        .reindexer()
        .reindex(&layer, KeyIndexMethod::by_millis(HOUR))
        .unwrap();

    let query = KeyBounds::new(SpaceTimeKey::new(0, 2, 0), SpaceTimeKey::new(3, 2, 6 * HOUR));
    let found: Vec<(SpaceTimeKey, Tile)> = catalog.reader().read(&layer, &query).unwrap();
    let expected: Vec<(SpaceTimeKey, Tile)> = records.into_iter().filter(|(k, _)| k.instant <= 6 * HOUR).collect();
    assert_eq!(sorted(found), sorted(expected));
}

#[test]
fn test_reindex_refuses_mismatched_method() {
    let catalog = memory_catalog();
    let layer = LayerId::new("dem", 4);
    catalog.write(&layer, header(), grid(2, 2)).unwrap();

    let err = catalog
        .reindexer()
        .reindex(&layer, KeyIndexMethod::by_days(1))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(catalog.layers().unwrap(), vec![layer.clone()]);
    assert_eq!(all(&catalog, &layer), sorted(grid(2, 2)));
}
