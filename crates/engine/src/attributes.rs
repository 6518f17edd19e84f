//! Layer attribute store
//!
//! Durable mapping from [`LayerId`] to [`LayerMetadata`], kept in the
//! backend's metadata table as JSON. Every layer operation resolves metadata
//! here before touching tile records.
//!
//! ## Design
//!
//! The metadata table also holds reindex markers under a reserved prefix.
//! They share the table so that a marker and the layer it guards live and
//! die in the same backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tessera_core::{
    Error, KeyBounds, KeyType, LayerHeader, LayerId, LayerKey, Result, SpaceTimeKey, SpatialKey,
};
use tessera_index::{build_index, IndexConfig};
use tessera_storage::Backend;
use tracing::{debug, info};

/// Metadata table prefix reserved for reindex markers
pub const MARKER_PREFIX: &str = "~reindex/";

/// Everything needed to read a layer back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    /// Layer described
    pub layer: LayerId,
    /// Shape of the layer's keys
    pub key_type: KeyType,
    /// Tile schema and tiling grid
    pub header: LayerHeader,
    /// Key index the records are stored under
    pub index: IndexConfig,
    /// Storage format version
    pub format_version: u32,
}

impl LayerMetadata {
    /// Format version written by this release
    pub const FORMAT_VERSION: u32 = 1;

    /// Metadata for a layer of `K` keys
    pub fn new<K: LayerKey>(layer: LayerId, header: LayerHeader, index: IndexConfig) -> Self {
        Self {
            layer,
            key_type: K::KEY_TYPE,
            header,
            index,
            format_version: Self::FORMAT_VERSION,
        }
    }

    /// Same layer description under another identifier
    pub fn renamed(&self, layer: LayerId) -> Self {
        Self {
            layer,
            ..self.clone()
        }
    }

    /// Same layer description under another key index
    pub fn reindexed(&self, index: IndexConfig) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }

    /// Check that the layer holds `K` keys
    ///
    /// # Errors
    /// `KeyTypeMismatch` if it holds another key shape
    pub fn check_key<K: LayerKey>(&self) -> Result<()> {
        if self.key_type != K::KEY_TYPE {
            return Err(Error::KeyTypeMismatch {
                layer: self.layer.clone(),
                expected: K::KEY_TYPE,
                actual: self.key_type,
            });
        }
        Ok(())
    }

    /// Key bounds recorded in the index configuration
    ///
    /// # Errors
    /// `KeyTypeMismatch` if the layer holds another key shape
    pub fn key_bounds<K: LayerKey>(&self) -> Result<KeyBounds<K>> {
        self.check_key::<K>()?;
        self.index.key_bounds::<K>()
    }

    /// Check that `index` can be built for this layer's key type
    ///
    /// # Errors
    /// `InvalidConfig` if the method does not apply or the bounds are unusable
    pub fn check_index(&self, index: &IndexConfig) -> Result<()> {
        match self.key_type {
            KeyType::Spatial => build_index::<SpatialKey>(index).map(|_| ()),
            KeyType::SpaceTime => build_index::<SpaceTimeKey>(index).map(|_| ()),
        }
    }
}

/// Step a reindex reached before it was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReindexStage {
    /// Records are being copied into the temporary layer; the original is intact
    Copying,
    /// The original is being replaced by the temporary layer
    Swapping,
}

impl fmt::Display for ReindexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReindexStage::Copying => f.write_str("copying"),
            ReindexStage::Swapping => f.write_str("swapping"),
        }
    }
}

/// Record of an in-flight reindex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexMarker {
    /// Layer being reindexed
    pub layer: LayerId,
    /// Temporary layer holding the reindexed copy
    pub temp: LayerId,
    /// Step reached
    pub stage: ReindexStage,
    /// Target index
    pub index: IndexConfig,
}

fn marker_key(layer: &LayerId) -> String {
    format!("{}{}", MARKER_PREFIX, layer.table_name())
}

/// Layer metadata and reindex markers over a storage backend
///
/// Cheap to clone; clones share the backend.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tessera_core::{Crs, CellType, Extent, LayerHeader, LayerId, LayoutDefinition, KeyBounds, SpatialKey};
/// use tessera_engine::{AttributeStore, LayerMetadata};
/// use tessera_index::{IndexConfig, KeyIndexMethod};
/// use tessera_storage::MemoryBackend;
///
/// let store = AttributeStore::new(Arc::new(MemoryBackend::new()));
/// let layout = LayoutDefinition::new(Extent::new(0.0, 0.0, 1.0, 1.0), 256, 256, 4, 4);
/// let header = LayerHeader::new(Crs::WGS84, CellType::U8, 1, layout);
/// let bounds = KeyBounds::new(SpatialKey::new(0, 0), SpatialKey::new(3, 3));
/// let layer = LayerId::new("dem", 2);
/// let meta = LayerMetadata::new::<SpatialKey>(
///     layer.clone(),
///     header,
///     IndexConfig::new(KeyIndexMethod::ZCurve, &bounds),
/// );
///
/// store.register(&meta, false).unwrap();
/// assert_eq!(store.lookup(&layer).unwrap(), meta);
/// assert_eq!(store.list().unwrap(), vec![layer]);
/// ```
#[derive(Debug, Clone)]
pub struct AttributeStore {
    backend: Arc<dyn Backend>,
}

impl AttributeStore {
    /// Create a store over `backend`
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Backend holding metadata and tile tables
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    // ========================================================================
    // Layer metadata
    // ========================================================================

    /// Register metadata for a layer
    ///
    /// # Errors
    /// - `AlreadyExists` if the layer is registered and `overwrite` is false
    /// - `InvalidConfig` if the layer name is empty, collides with the
    ///   reserved marker prefix, or makes a table name longer than
    ///   [`LayerId::MAX_TABLE_NAME_LEN`]
    pub fn register(&self, meta: &LayerMetadata, overwrite: bool) -> Result<()> {
        let key = meta.layer.table_name();
        if key.starts_with(MARKER_PREFIX) || meta.layer.name.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "invalid layer name {:?}",
                meta.layer.name
            )));
        }
        if key.len() > LayerId::MAX_TABLE_NAME_LEN {
            return Err(Error::InvalidConfig(format!(
                "table name of {} is {} bytes, at most {} allowed",
                meta.layer,
                key.len(),
                LayerId::MAX_TABLE_NAME_LEN
            )));
        }
        if !overwrite && self.backend.meta_get(&key)?.is_some() {
            return Err(Error::AlreadyExists {
                layer: meta.layer.clone(),
            });
        }
        let bytes = serde_json::to_vec(meta)?;
        self.backend.meta_put(&key, bytes)?;
        debug!(layer = %meta.layer, index = %meta.index.method, overwrite, "Registered layer metadata");
        Ok(())
    }

    /// Metadata of `layer`
    ///
    /// # Errors
    /// `LayerNotFound` if the layer is not registered
    pub fn lookup(&self, layer: &LayerId) -> Result<LayerMetadata> {
        self.try_lookup(layer)?.ok_or_else(|| Error::LayerNotFound {
            layer: layer.clone(),
        })
    }

    /// Metadata of `layer`, `None` if it is not registered
    pub fn try_lookup(&self, layer: &LayerId) -> Result<Option<LayerMetadata>> {
        let bytes = match self.backend.meta_get(&layer.table_name())? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let meta: LayerMetadata = serde_json::from_slice(&bytes)?;
        if meta.format_version > LayerMetadata::FORMAT_VERSION {
            return Err(Error::InvalidConfig(format!(
                "layer {} uses format version {}, newest supported is {}",
                layer,
                meta.format_version,
                LayerMetadata::FORMAT_VERSION
            )));
        }
        Ok(Some(meta))
    }

    /// Check if `layer` is registered
    pub fn exists(&self, layer: &LayerId) -> Result<bool> {
        Ok(self.backend.meta_get(&layer.table_name())?.is_some())
    }

    /// Remove the metadata of `layer`; returns whether it existed
    pub fn delete(&self, layer: &LayerId) -> Result<bool> {
        let removed = self.backend.meta_delete(&layer.table_name())?;
        if removed {
            debug!(layer = %layer, "Deleted layer metadata");
        }
        Ok(removed)
    }

    /// Every registered layer, sorted
    pub fn list(&self) -> Result<Vec<LayerId>> {
        let mut layers: Vec<LayerId> = self
            .backend
            .meta_list()?
            .iter()
            .filter(|name| !name.starts_with(MARKER_PREFIX))
            .filter_map(|name| LayerId::from_table_name(name))
            .collect();
        layers.sort();
        Ok(layers)
    }

    /// Metadata of `layer` for an operation about to touch its records
    ///
    /// # Errors
    /// - `ReindexPending` while a reindex of the layer is swapping its
    ///   records, or if the layer is missing because a reindex of it was
    ///   interrupted
    /// - `LayerNotFound` otherwise when it is not registered
    pub fn resolve(&self, layer: &LayerId) -> Result<LayerMetadata> {
        let marker = self.read_marker(layer)?;
        let pending = || Error::ReindexPending {
            layer: layer.clone(),
        };
        if matches!(&marker, Some(m) if m.stage == ReindexStage::Swapping) {
            return Err(pending());
        }
        match self.try_lookup(layer)? {
            Some(meta) => Ok(meta),
            None if marker.is_some() => Err(pending()),
            None => Err(Error::LayerNotFound {
                layer: layer.clone(),
            }),
        }
    }

    /// Check that records read under `meta` were not torn by a reindex
    ///
    /// Called after a scan: a swap that started or finished since `meta`
    /// was resolved may have removed or rewritten the scanned buckets.
    ///
    /// # Errors
    /// `ReindexPending` if a swap is underway or the layer's index method
    /// changed
    pub fn confirm(&self, meta: &LayerMetadata) -> Result<()> {
        let swapped = match self.read_marker(&meta.layer)? {
            Some(marker) => marker.stage == ReindexStage::Swapping,
            None => matches!(
                self.try_lookup(&meta.layer)?,
                Some(current) if current.index.method != meta.index.method
            ),
        };
        if swapped {
            return Err(Error::ReindexPending {
                layer: meta.layer.clone(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Reindex markers
    // ========================================================================

    /// Persist `marker`, replacing any marker for the same layer
    pub fn write_marker(&self, marker: &ReindexMarker) -> Result<()> {
        let bytes = serde_json::to_vec(marker)?;
        self.backend.meta_put(&marker_key(&marker.layer), bytes)?;
        info!(layer = %marker.layer, temp = %marker.temp, stage = %marker.stage, "Reindex marker written");
        Ok(())
    }

    /// Pending reindex marker of `layer`
    pub fn read_marker(&self, layer: &LayerId) -> Result<Option<ReindexMarker>> {
        match self.backend.meta_get(&marker_key(layer))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove the marker of `layer`; returns whether one existed
    pub fn clear_marker(&self, layer: &LayerId) -> Result<bool> {
        let removed = self.backend.meta_delete(&marker_key(layer))?;
        if removed {
            debug!(layer = %layer, "Reindex marker cleared");
        }
        Ok(removed)
    }

    /// Every pending reindex marker, ordered by layer
    pub fn list_markers(&self) -> Result<Vec<ReindexMarker>> {
        let mut markers = Vec::new();
        for name in self.backend.meta_list()? {
            if !name.starts_with(MARKER_PREFIX) {
                continue;
            }
            if let Some(bytes) = self.backend.meta_get(&name)? {
                markers.push(serde_json::from_slice::<ReindexMarker>(&bytes)?);
            }
        }
        markers.sort_by(|a, b| a.layer.cmp(&b.layer));
        Ok(markers)
    }
}
