//! Tile keys and key bounds
//!
//! A layer addresses its tiles either by [`SpatialKey`] (grid position) or by
//! [`SpaceTimeKey`] (grid position plus instant). Both are totally ordered;
//! the order here is structural and has nothing to do with the storage
//! order, which comes from a key index.

use crate::geometry::GridBounds;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Shape of the keys stored in a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// [`SpatialKey`]
    Spatial,
    /// [`SpaceTimeKey`]
    SpaceTime,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Spatial => f.write_str("spatial"),
            KeyType::SpaceTime => f.write_str("space-time"),
        }
    }
}

/// Key-shape-independent form of [`KeyBounds`], used in persisted metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpan {
    /// Grid positions covered
    pub grid: GridBounds,
    /// Inclusive instant range in epoch milliseconds, for temporal keys
    pub instants: Option<(i64, i64)>,
}

/// Behavior every layer key provides
pub trait LayerKey:
    Clone + fmt::Debug + fmt::Display + Eq + Ord + Hash + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Shape tag recorded in layer metadata
    const KEY_TYPE: KeyType;

    /// Grid position of this key
    fn spatial_key(&self) -> SpatialKey;

    /// Component-wise minimum
    fn min_bound(&self, other: &Self) -> Self;

    /// Component-wise maximum
    fn max_bound(&self, other: &Self) -> Self;

    /// Check if `self` lies inside `bounds` on every component
    fn in_bounds(&self, bounds: &KeyBounds<Self>) -> bool;

    /// Erase bounds to their persisted form
    fn span_of(bounds: &KeyBounds<Self>) -> KeySpan;

    /// Rebuild bounds from their persisted form
    fn bounds_of(span: &KeySpan) -> Option<KeyBounds<Self>>;
}

/// Position of a tile in a layer's tiling grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpatialKey {
    /// Tile column
    pub col: u32,
    /// Tile row
    pub row: u32,
}

impl SpatialKey {
    /// Create a key
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for SpatialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpatialKey({}, {})", self.col, self.row)
    }
}

impl LayerKey for SpatialKey {
    const KEY_TYPE: KeyType = KeyType::Spatial;

    fn spatial_key(&self) -> SpatialKey {
        *self
    }

    fn min_bound(&self, other: &Self) -> Self {
        SpatialKey::new(self.col.min(other.col), self.row.min(other.row))
    }

    fn max_bound(&self, other: &Self) -> Self {
        SpatialKey::new(self.col.max(other.col), self.row.max(other.row))
    }

    fn in_bounds(&self, bounds: &KeyBounds<Self>) -> bool {
        self.col >= bounds.min.col
            && self.col <= bounds.max.col
            && self.row >= bounds.min.row
            && self.row <= bounds.max.row
    }

    fn span_of(bounds: &KeyBounds<Self>) -> KeySpan {
        KeySpan {
            grid: bounds.grid_bounds(),
            instants: None,
        }
    }

    fn bounds_of(span: &KeySpan) -> Option<KeyBounds<Self>> {
        if !span.grid.is_well_formed() {
            return None;
        }
        Some(KeyBounds::new(
            SpatialKey::new(span.grid.col_min, span.grid.row_min),
            SpatialKey::new(span.grid.col_max, span.grid.row_max),
        ))
    }
}

/// Grid position plus instant (epoch milliseconds, UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpaceTimeKey {
    /// Tile column
    pub col: u32,
    /// Tile row
    pub row: u32,
    /// Milliseconds since the Unix epoch
    pub instant: i64,
}

impl SpaceTimeKey {
    /// Create a key from raw epoch milliseconds
    pub const fn new(col: u32, row: u32, instant: i64) -> Self {
        Self { col, row, instant }
    }

    /// Create a key from a timestamp
    pub fn at(col: u32, row: u32, time: DateTime<Utc>) -> Self {
        Self::new(col, row, time.timestamp_millis())
    }

    /// Instant as a timestamp, `None` if out of chrono's range
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.instant)
    }
}

impl fmt::Display for SpaceTimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpaceTimeKey({}, {}, {})", self.col, self.row, self.instant)
    }
}

impl LayerKey for SpaceTimeKey {
    const KEY_TYPE: KeyType = KeyType::SpaceTime;

    fn spatial_key(&self) -> SpatialKey {
        SpatialKey::new(self.col, self.row)
    }

    fn min_bound(&self, other: &Self) -> Self {
        SpaceTimeKey::new(
            self.col.min(other.col),
            self.row.min(other.row),
            self.instant.min(other.instant),
        )
    }

    fn max_bound(&self, other: &Self) -> Self {
        SpaceTimeKey::new(
            self.col.max(other.col),
            self.row.max(other.row),
            self.instant.max(other.instant),
        )
    }

    fn in_bounds(&self, bounds: &KeyBounds<Self>) -> bool {
        self.col >= bounds.min.col
            && self.col <= bounds.max.col
            && self.row >= bounds.min.row
            && self.row <= bounds.max.row
            && self.instant >= bounds.min.instant
            && self.instant <= bounds.max.instant
    }

    fn span_of(bounds: &KeyBounds<Self>) -> KeySpan {
        KeySpan {
            grid: bounds.grid_bounds(),
            instants: Some((bounds.min.instant, bounds.max.instant)),
        }
    }

    fn bounds_of(span: &KeySpan) -> Option<KeyBounds<Self>> {
        let (start, end) = span.instants?;
        if !span.grid.is_well_formed() || start > end {
            return None;
        }
        Some(KeyBounds::new(
            SpaceTimeKey::new(span.grid.col_min, span.grid.row_min, start),
            SpaceTimeKey::new(span.grid.col_max, span.grid.row_max, end),
        ))
    }
}

/// Inclusive component-wise bounds of a set of keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBounds<K> {
    /// Component-wise minimum
    pub min: K,
    /// Component-wise maximum
    pub max: K,
}

impl<K: LayerKey> KeyBounds<K> {
    /// Create bounds from corners
    pub fn new(min: K, max: K) -> Self {
        Self { min, max }
    }

    /// Tightest bounds of `keys`, `None` when empty
    pub fn from_keys<'a, I>(keys: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a K>,
    {
        let mut iter = keys.into_iter();
        let first = iter.next()?;
        let mut bounds = KeyBounds::new(first.clone(), first.clone());
        for key in iter {
            bounds.include(key);
        }
        Some(bounds)
    }

    /// Grow to cover `key`
    pub fn include(&mut self, key: &K) {
        self.min = self.min.min_bound(key);
        self.max = self.max.max_bound(key);
    }

    /// Smallest bounds covering both
    pub fn combine(&self, other: &KeyBounds<K>) -> KeyBounds<K> {
        KeyBounds::new(self.min.min_bound(&other.min), self.max.max_bound(&other.max))
    }

    /// Check if `key` lies inside
    pub fn contains(&self, key: &K) -> bool {
        key.in_bounds(self)
    }

    /// Check if `other` lies entirely inside
    pub fn contains_bounds(&self, other: &KeyBounds<K>) -> bool {
        other.min.in_bounds(self) && other.max.in_bounds(self)
    }

    /// Spatial part of the bounds
    pub fn grid_bounds(&self) -> GridBounds {
        let min = self.min.spatial_key();
        let max = self.max.spatial_key();
        GridBounds::new(min.col, min.row, max.col, max.row)
    }
}

impl<K: fmt::Display> fmt::Display for KeyBounds<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}
