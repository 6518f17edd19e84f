//! Shared catalogs across threads

use crate::common::*;
use std::thread;
use tessera::prelude::*;

#[test]
fn test_parallel_writers_on_distinct_layers() {
    let catalog = memory_catalog();

    thread::scope(|s| {
        for i in 0..8u32 {
            let catalog = catalog.clone();
            s.spawn(move || {
                let layer = LayerId::new(format!("tile-set-{}", i), i);
                catalog.write(&layer, header(), grid(i + 1, 3)).unwrap();
            });
        }
    });

    let layers = catalog.layers().unwrap();
    assert_eq!(layers.len(), 8);
    for i in 0..8u32 {
        let layer = LayerId::new(format!("tile-set-{}", i), i);
        let all: Vec<(SpatialKey, Tile)> = catalog.reader().read_all(&layer).unwrap();
        assert_eq!(sorted(all), sorted(grid(i + 1, 3)));
    }
}

#[test]
fn test_readers_alongside_updates() {
    let (_dir, catalog) = file_catalog();
    let layer = LayerId::new("dem", 3);
    catalog.write(&layer, header(), grid(4, 4)).unwrap();
    let fixed = KeyBounds::new(SpatialKey::new(0, 0), SpatialKey::new(3, 1));

    thread::scope(|s| {
        let updater = catalog.updater();
        let layer = &layer;
        s.spawn(move || {
            for round in 0..20u8 {
                updater
                    .update(layer, vec![(SpatialKey::new(2, 3), tile(100 + round))])
                    .unwrap();
            }
        });
        for _ in 0..4 {
            let reader = catalog.reader();
            let fixed = &fixed;
            s.spawn(move || {
                for _ in 0..20 {
                    let found: Vec<(SpatialKey, Tile)> = reader.read(layer, fixed).unwrap();
                    assert_eq!(sorted(found), sorted(grid(4, 2)));
                }
            });
        }
    });

    let last: Option<Tile> = catalog.reader().read_key(&layer, &SpatialKey::new(2, 3)).unwrap();
    assert_eq!(last, Some(tile(119)));
}
