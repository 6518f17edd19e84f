//! File-backed catalogs across reopen, including reindex recovery

use crate::common::*;
use tessera::prelude::*;
use tessera_engine::{ReindexMarker, ReindexStage};

fn all(catalog: &Catalog, layer: &LayerId) -> Vec<(SpatialKey, Tile)> {
    sorted(catalog.reader().read_all(layer).unwrap())
}

/// Leave `layer` mid-reindex to row-major: temp layer copied, marker at `stage`
fn interrupt_reindex(catalog: &Catalog, layer: &LayerId, stage: ReindexStage) -> LayerId {
    let temp = LayerId::new(format!("{}.reindex-interrupted", layer.name), layer.zoom);
    catalog
        .copier()
        .copy_with(layer, &temp, KeyIndexMethod::RowMajor)
        .unwrap();
    let marker = ReindexMarker {
        layer: layer.clone(),
        temp: temp.clone(),
        stage,
        index: catalog.metadata(&temp).unwrap().index,
    };
    catalog.attributes().write_marker(&marker).unwrap();
    temp
}

#[test]
fn test_layers_survive_reopen() {
    let (dir, catalog) = file_catalog();
    let layer = LayerId::new("dem", 6);
    catalog.write(&layer, header(), grid(6, 6)).unwrap();
    catalog
        .updater()
        .update(&layer, vec![(SpatialKey::new(0, 0), tile(250))])
        .unwrap();
    drop(catalog);

    let catalog = reopen(&dir);
    assert_eq!(catalog.layers().unwrap(), vec![layer.clone()]);
    let mut expected = grid(6, 6);
    expected[0].1 = tile(250);
    assert_eq!(all(&catalog, &layer), sorted(expected));
    assert_eq!(catalog.metadata(&layer).unwrap().header, header());
}

#[test]
fn test_deletes_survive_reopen() {
    let (dir, catalog) = file_catalog();
    let (keep, gone) = (LayerId::new("keep", 1), LayerId::new("gone", 1));
    catalog.write(&keep, header(), grid(2, 2)).unwrap();
    catalog.write(&gone, header(), grid(2, 2)).unwrap();
    catalog.deleter().delete(&gone).unwrap();
    drop(catalog);

    let catalog = reopen(&dir);
    assert_eq!(catalog.layers().unwrap(), vec![keep]);
    assert!(!catalog.exists(&gone).unwrap());
}

#[test]
fn test_reindex_survives_reopen() {
    let (dir, catalog) = file_catalog();
    let layer = LayerId::new("dem", 6);
    catalog.write(&layer, header(), grid(5, 5)).unwrap();
    catalog
        .reindexer()
        .reindex(&layer, KeyIndexMethod::RowMajor)
        .unwrap();
    drop(catalog);

    let catalog = reopen(&dir);
    assert_eq!(catalog.metadata(&layer).unwrap().index.method, KeyIndexMethod::RowMajor);
    assert_eq!(all(&catalog, &layer), sorted(grid(5, 5)));
    assert_eq!(catalog.attributes().backend().tables().unwrap(), vec![layer.table_name()]);
}

#[test]
fn test_open_rolls_back_reindex_interrupted_while_copying() {
    let (dir, catalog) = file_catalog();
    let layer = LayerId::new("dem", 6);
    catalog.write(&layer, header(), grid(4, 4)).unwrap();
    let temp = interrupt_reindex(&catalog, &layer, ReindexStage::Copying);

    let err = catalog
        .updater()
        .update(&layer, vec![(SpatialKey::new(0, 0), tile(1))])
        .unwrap_err();
    assert!(matches!(err, Error::ReindexPending { .. }));
    drop(catalog);

    let catalog = reopen(&dir);
    assert!(catalog.attributes().list_markers().unwrap().is_empty());
    assert!(!catalog.exists(&temp).unwrap());
    assert_eq!(catalog.layers().unwrap(), vec![layer.clone()]);
    assert_eq!(catalog.metadata(&layer).unwrap().index.method, KeyIndexMethod::ZCurve);
    assert_eq!(all(&catalog, &layer), sorted(grid(4, 4)));
}

#[test]
fn test_open_rolls_forward_reindex_interrupted_while_swapping() {
    let (dir, catalog) = file_catalog();
    let layer = LayerId::new("dem", 6);
    catalog.write(&layer, header(), grid(4, 4)).unwrap();
    let temp = interrupt_reindex(&catalog, &layer, ReindexStage::Swapping);
    catalog.deleter().delete(&layer).unwrap();

    let err = catalog.reader().read_all::<SpatialKey, Tile>(&layer).unwrap_err();
    assert!(matches!(err, Error::ReindexPending { .. }));
    drop(catalog);

    let catalog = reopen(&dir);
    assert!(catalog.attributes().list_markers().unwrap().is_empty());
    assert!(!catalog.exists(&temp).unwrap());
    assert_eq!(catalog.layers().unwrap(), vec![layer.clone()]);
    assert_eq!(catalog.metadata(&layer).unwrap().index.method, KeyIndexMethod::RowMajor);
    assert_eq!(all(&catalog, &layer), sorted(grid(4, 4)));
    assert_eq!(catalog.attributes().backend().tables().unwrap(), vec![layer.table_name()]);
}

#[test]
fn test_skip_recovery_leaves_marker() {
    let (dir, catalog) = file_catalog();
    let layer = LayerId::new("dem", 6);
    catalog.write(&layer, header(), grid(2, 2)).unwrap();
    interrupt_reindex(&catalog, &layer, ReindexStage::Copying);
    drop(catalog);

    let catalog = Catalog::builder()
        .path(dir.path())
        .sync(SyncMode::None)
        .skip_recovery()
        .open()
        .unwrap();
    assert_eq!(catalog.attributes().list_markers().unwrap().len(), 1);
    assert_eq!(catalog.reindexer().recover(&layer).unwrap(), Recovery::RolledBack);
    assert_eq!(catalog.layers().unwrap(), vec![layer]);
}

#[test]
fn test_reindex_of_long_layer_name_on_disk() {
    let (dir, catalog) = file_catalog();
    let table_budget = LayerId::MAX_TABLE_NAME_LEN - ":6".len();
    let layer = LayerId::new("n".repeat(table_budget), 6);
    catalog.write(&layer, header(), grid(3, 3)).unwrap();

    catalog
        .reindexer()
        .reindex(&layer, KeyIndexMethod::RowMajor)
        .unwrap();
    drop(catalog);

    let catalog = reopen(&dir);
    assert_eq!(catalog.layers().unwrap(), vec![layer.clone()]);
    assert_eq!(catalog.metadata(&layer).unwrap().index.method, KeyIndexMethod::RowMajor);
    assert_eq!(all(&catalog, &layer), sorted(grid(3, 3)));
}
