//! Catalog configuration
//!
//! A catalog can be described by a TOML document:
//!
//! ```toml
//! [storage]
//! backend = "file"
//! path = "/data/catalog"
//! sync = "batched:64"
//!
//! [index]
//! type = "z-curve"
//!
//! [ingest]
//! workers = 4
//! max_window = 256
//! batch = 64
//! ```
//!
//! Every section is optional. A missing `[storage]` section means an
//! in-memory catalog.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tessera_core::{Error, Result};
use tessera_index::KeyIndexMethod;
use tessera_storage::SyncMode;

/// Default maximum ingest window, in pixels per side
pub const DEFAULT_MAX_WINDOW: u32 = 256;

/// Default number of windows decoded per ingest write
pub const DEFAULT_INGEST_BATCH: usize = 64;

/// Where a catalog keeps its tables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum StorageConfig {
    /// Nothing persisted
    #[default]
    Memory,
    /// Log files under `path`
    File {
        /// Catalog directory
        path: PathBuf,
        /// `none`, `strict`, `batched` or `batched:<n>`; strict if absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sync: Option<String>,
    },
}

impl StorageConfig {
    /// Sync mode of a file backend
    ///
    /// # Errors
    /// `InvalidConfig` if the sync setting does not parse
    pub fn sync_mode(&self) -> Result<SyncMode> {
        match self {
            StorageConfig::File { sync: Some(s), .. } => {
                SyncMode::parse(s).ok_or_else(|| Error::InvalidConfig(format!("unknown sync mode {:?}", s)))
            }
            _ => Ok(SyncMode::default()),
        }
    }
}

/// Ingest defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Worker threads decoding windows
    pub workers: usize,
    /// Largest window side in pixels; `0` reads each raster whole
    pub max_window: u32,
    /// Windows decoded and written per batch
    pub batch: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_window: DEFAULT_MAX_WINDOW,
            batch: DEFAULT_INGEST_BATCH,
        }
    }
}

/// Full catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Storage backend
    pub storage: StorageConfig,
    /// Index method for layers written without an explicit one
    pub index: KeyIndexMethod,
    /// Ingest defaults
    pub ingest: IngestConfig,
}

impl CatalogConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    /// `InvalidConfig` if the document is not valid TOML, does not match the
    /// schema, or carries an unknown sync mode
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `Io` if the file cannot be read, otherwise as
    /// [`CatalogConfig::from_toml_str`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as a TOML document
    ///
    /// # Errors
    /// `Serialization` if the document cannot be rendered
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        self.storage.sync_mode()?;
        if self.ingest.workers == 0 {
            return Err(Error::InvalidConfig("ingest.workers must be at least 1".to_string()));
        }
        if self.ingest.batch == 0 {
            return Err(Error::InvalidConfig("ingest.batch must be at least 1".to_string()));
        }
        if let KeyIndexMethod::ZCurveSpaceTime {
            temporal_resolution_ms,
        } = self.index
        {
            if temporal_resolution_ms <= 0 {
                return Err(Error::InvalidConfig(format!(
                    "temporal resolution must be positive, got {}ms",
                    temporal_resolution_ms
                )));
            }
        }
        Ok(())
    }
}
