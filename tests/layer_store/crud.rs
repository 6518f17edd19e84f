//! Layer reads, writes, updates and deletes through the catalog

use crate::common::*;
use tessera::prelude::*;

const DAY: i64 = 86_400_000;

// =============================================================================
// WRITE / READ
// =============================================================================

#[test]
fn test_range_query_returns_exactly_the_keys_inside() {
    let catalog = memory_catalog();
    let layer = LayerId::new("landcover", 5);
    catalog.write(&layer, header(), grid(10, 10)).unwrap();

    let query = KeyBounds::new(SpatialKey::new(2, 3), SpatialKey::new(6, 4));
    let found: Vec<(SpatialKey, Tile)> = catalog.reader().read(&layer, &query).unwrap();

    let expected: Vec<(SpatialKey, Tile)> = grid(10, 10)
        .into_iter()
        .filter(|(k, _)| query.contains(k))
        .collect();
    assert_eq!(found.len(), 10);
    assert_eq!(sorted(found), sorted(expected));
}

#[test]
fn test_every_index_method_answers_the_same_query() {
    let catalog = memory_catalog();
    let query = KeyBounds::new(SpatialKey::new(1, 0), SpatialKey::new(3, 5));
    let mut answers = Vec::new();

    for (i, method) in [KeyIndexMethod::ZCurve, KeyIndexMethod::RowMajor].into_iter().enumerate() {
        let layer = LayerId::new(format!("grid-{}", i), 3);
        catalog
            .writer()
            .write(&layer, header(), method, grid(7, 6), WriteMode::Create)
            .unwrap();
        let found: Vec<(SpatialKey, Tile)> = catalog.reader().read(&layer, &query).unwrap();
        answers.push(sorted(found));
    }

    assert_eq!(answers[0].len(), 18);
    assert_eq!(answers[0], answers[1]);
}

#[test]
fn test_query_outside_layer_is_empty() {
    let catalog = memory_catalog();
    let layer = LayerId::new("small", 1);
    catalog.write(&layer, header(), grid(2, 2)).unwrap();

    let query = KeyBounds::new(SpatialKey::new(40, 40), SpatialKey::new(50, 50));
    let found: Vec<(SpatialKey, Tile)> = catalog.reader().read(&layer, &query).unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_space_time_query_by_interval() {
    let catalog = memory_catalog();
    let layer = LayerId::new("ndvi", 7);
    catalog
        .writer()
        .write(&layer, header(), KeyIndexMethod::by_days(1), series(&[0, DAY, 2 * DAY, 3 * DAY]), WriteMode::Create)
        .unwrap();

    let query = KeyBounds::new(SpaceTimeKey::new(1, 2, DAY), SpaceTimeKey::new(2, 2, 2 * DAY));
    let found: Vec<(SpaceTimeKey, Tile)> = catalog.reader().read(&layer, &query).unwrap();

    let keys: Vec<SpaceTimeKey> = sorted(found).into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec![
            SpaceTimeKey::new(1, 2, DAY),
            SpaceTimeKey::new(1, 2, 2 * DAY),
            SpaceTimeKey::new(2, 2, DAY),
            SpaceTimeKey::new(2, 2, 2 * DAY),
        ]
    );
}

#[test]
fn test_reading_with_the_wrong_key_type() {
    let catalog = memory_catalog();
    let layer = LayerId::new("dem", 2);
    catalog.write(&layer, header(), grid(2, 2)).unwrap();

    let err = catalog
        .reader()
        .read_all::<SpaceTimeKey, Tile>(&layer)
        .unwrap_err();
    assert!(matches!(err, Error::KeyTypeMismatch { .. }));
}

#[test]
fn test_missing_layer() {
    let catalog = memory_catalog();
    let err = catalog
        .reader()
        .read_all::<SpatialKey, Tile>(&LayerId::new("ghost", 0))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_metadata_describes_the_layer() {
    let catalog = memory_catalog();
    let layer = LayerId::new("dem", 2);
    catalog.write(&layer, header(), grid(3, 2)).unwrap();

    let meta = catalog.metadata(&layer).unwrap();
    assert_eq!(meta.layer, layer);
    assert_eq!(meta.header, header());
    assert_eq!(meta.format_version, 1);
    assert_eq!(meta.index.method, KeyIndexMethod::ZCurve);
    assert_eq!(
        meta.key_bounds::<SpatialKey>().unwrap(),
        KeyBounds::new(SpatialKey::new(0, 0), SpatialKey::new(2, 1))
    );
}

// =============================================================================
// WRITE MODES
// =============================================================================

#[test]
fn test_create_refuses_existing_layer() {
    let catalog = memory_catalog();
    let layer = LayerId::new("dem", 2);
    catalog.write(&layer, header(), grid(2, 2)).unwrap();

    let err = catalog.write(&layer, header(), grid(1, 1)).unwrap_err();
    assert!(matches!(err, Error::LayerExists { .. }));
    let all: Vec<(SpatialKey, Tile)> = catalog.reader().read_all(&layer).unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn test_overlong_layer_name_is_refused() {
    let (_dir, catalog) = file_catalog();
    let layer = LayerId::new("n".repeat(LayerId::MAX_TABLE_NAME_LEN), 0);

    let err = catalog.write(&layer, header(), grid(2, 2)).unwrap_err();

    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(catalog.layers().unwrap().is_empty());
    assert!(catalog.attributes().backend().tables().unwrap().is_empty());
}

#[test]
fn test_append_and_overwrite() {
    let catalog = memory_catalog();
    let writer = catalog.writer();
    let layer = LayerId::new("dem", 2);
    writer
        .write(&layer, header(), KeyIndexMethod::ZCurve, grid(2, 2), WriteMode::Create)
        .unwrap();

    writer
        .write(
            &layer,
            header(),
            KeyIndexMethod::ZCurve,
            vec![(SpatialKey::new(9, 9), tile(99))],
            WriteMode::Append,
        )
        .unwrap();
    let all: Vec<(SpatialKey, Tile)> = catalog.reader().read_all(&layer).unwrap();
    assert_eq!(all.len(), 5);

    writer
        .write(
            &layer,
            header(),
            KeyIndexMethod::RowMajor,
            vec![(SpatialKey::new(1, 1), tile(11))],
            WriteMode::Overwrite,
        )
        .unwrap();
    let all: Vec<(SpatialKey, Tile)> = catalog.reader().read_all(&layer).unwrap();
    assert_eq!(all, vec![(SpatialKey::new(1, 1), tile(11))]);
    assert_eq!(catalog.metadata(&layer).unwrap().index.method, KeyIndexMethod::RowMajor);
}

// =============================================================================
// UPDATE / DELETE
// =============================================================================

#[test]
fn test_update_replaces_only_given_keys() {
    let catalog = memory_catalog();
    let layer = LayerId::new("dem", 2);
    catalog.write(&layer, header(), grid(3, 3)).unwrap();

    catalog
        .updater()
        .update(&layer, vec![(SpatialKey::new(1, 1), tile(200)), (SpatialKey::new(12, 12), tile(201))])
        .unwrap();

    let reader = catalog.reader();
    let center: Option<Tile> = reader.read_key(&layer, &SpatialKey::new(1, 1)).unwrap();
    let corner: Option<Tile> = reader.read_key(&layer, &SpatialKey::new(2, 2)).unwrap();
    let far: Option<Tile> = reader.read_key(&layer, &SpatialKey::new(12, 12)).unwrap();
    assert_eq!(center, Some(tile(200)));
    assert_eq!(corner, Some(tile(8)));
    assert_eq!(far, Some(tile(201)));

    let all: Vec<(SpatialKey, Tile)> = reader.read_all(&layer).unwrap();
    assert_eq!(all.len(), 10);
}

#[test]
fn test_delete_removes_records_and_metadata() {
    let catalog = memory_catalog();
    let layer = LayerId::new("dem", 2);
    catalog.write(&layer, header(), grid(3, 3)).unwrap();

    assert!(catalog.deleter().delete(&layer).unwrap());
    assert!(!catalog.exists(&layer).unwrap());
    assert!(catalog.layers().unwrap().is_empty());
    assert!(catalog.reader().read_all::<SpatialKey, Tile>(&layer).unwrap_err().is_not_found());

    assert!(!catalog.deleter().delete(&layer).unwrap());
}

#[test]
fn test_layers_are_listed_in_order() {
    let catalog = memory_catalog();
    for layer in [LayerId::new("b", 0), LayerId::new("a", 3), LayerId::new("a", 1)] {
        catalog.write(&layer, header(), grid(1, 1)).unwrap();
    }
    assert_eq!(
        catalog.layers().unwrap(),
        vec![LayerId::new("a", 1), LayerId::new("a", 3), LayerId::new("b", 0)]
    );
}
