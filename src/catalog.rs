//! Catalog entry point
//!
//! A [`Catalog`] owns one storage backend and hands out the layer
//! operations bound to it. Every operation is a cheap stateless facade over
//! the shared [`AttributeStore`], so a catalog can be shared freely between
//! threads.

use crate::config::{CatalogConfig, IngestConfig, StorageConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{LayerHeader, LayerId, LayoutDefinition, Result, TileValue, WriteProgress};
use tessera_engine::{
    AttributeStore, Ingest, LayerCopier, LayerDeleter, LayerMetadata, LayerMover, LayerReader,
    LayerReindexer, LayerUpdater, LayerWriter, Recovery, WriteMode,
};
use tessera_index::{IndexableKey, KeyIndexMethod};
use tessera_raster::{RasterWindowReader, WindowPlanner};
use tessera_storage::{Backend, FileBackend, MemoryBackend, SyncMode};
use tracing::{info, warn};

/// A set of layers in one storage backend
///
/// # Example
///
/// ```
/// use tessera::prelude::*;
///
/// let catalog = Catalog::ephemeral().unwrap();
/// let layer = LayerId::new("ndvi", 3);
/// let layout = LayoutDefinition::new(Extent::new(0.0, 0.0, 8.0, 8.0), 2, 2, 4, 4);
/// let header = LayerHeader::new(Crs::WGS84, CellType::U8, 1, layout);
/// let tile = Tile::new(2, 2, CellType::U8, vec![1, 2, 3, 4]).unwrap();
///
/// catalog
///     .write(&layer, header, vec![(SpatialKey::new(1, 2), tile.clone())])
///     .unwrap();
///
/// let found: Option<Tile> = catalog.reader().read_key(&layer, &SpatialKey::new(1, 2)).unwrap();
/// assert_eq!(found, Some(tile));
/// ```
#[derive(Debug, Clone)]
pub struct Catalog {
    attributes: AttributeStore,
    file: Option<Arc<FileBackend>>,
    index: KeyIndexMethod,
    ingest: IngestConfig,
}

impl Catalog {
    /// Open (or create) a file-backed catalog at `path`
    ///
    /// Uses strict sync and recovers any interrupted reindex.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).open()
    }

    /// Create an in-memory catalog
    ///
    /// Creates no files; everything is lost when the last clone is dropped.
    pub fn ephemeral() -> Result<Self> {
        Self::builder().open()
    }

    /// Open the catalog described by `config`
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        CatalogBuilder::from_config(config)?.open()
    }

    /// Create a builder for catalog configuration
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Wrap an existing backend
    ///
    /// Pending reindexes are not recovered; call
    /// [`LayerReindexer::recover_all`] through [`Catalog::reindexer`].
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self {
            attributes: AttributeStore::new(backend),
            file: None,
            index: KeyIndexMethod::default(),
            ingest: IngestConfig::default(),
        }
    }

    // ========================================================================
    // Layer operations
    // ========================================================================

    /// Layer metadata store
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Reader bound to this catalog
    pub fn reader(&self) -> LayerReader {
        LayerReader::new(self.attributes.clone())
    }

    /// Writer bound to this catalog
    pub fn writer(&self) -> LayerWriter {
        LayerWriter::new(self.attributes.clone())
    }

    /// Updater bound to this catalog
    pub fn updater(&self) -> LayerUpdater {
        LayerUpdater::new(self.attributes.clone())
    }

    /// Deleter bound to this catalog
    pub fn deleter(&self) -> LayerDeleter {
        LayerDeleter::new(self.attributes.clone())
    }

    /// Copier bound to this catalog
    pub fn copier(&self) -> LayerCopier {
        LayerCopier::new(self.attributes.clone())
    }

    /// Mover bound to this catalog
    pub fn mover(&self) -> LayerMover {
        LayerMover::new(self.attributes.clone())
    }

    /// Reindexer bound to this catalog
    pub fn reindexer(&self) -> LayerReindexer {
        LayerReindexer::new(self.attributes.clone())
    }

    /// Create `layer` from `records` under the catalog's default index
    ///
    /// # Errors
    /// As [`LayerWriter::write`] in [`WriteMode::Create`]
    pub fn write<K, V>(&self, layer: &LayerId, header: LayerHeader, records: Vec<(K, V)>) -> Result<WriteProgress>
    where
        K: IndexableKey,
        V: TileValue,
    {
        self.writer()
            .write(layer, header, self.index, records, WriteMode::Create)
    }

    /// Every layer in the catalog, in order
    pub fn layers(&self) -> Result<Vec<LayerId>> {
        self.attributes.list()
    }

    /// Check if `layer` exists
    pub fn exists(&self, layer: &LayerId) -> Result<bool> {
        self.attributes.exists(layer)
    }

    /// Metadata of `layer`
    pub fn metadata(&self, layer: &LayerId) -> Result<LayerMetadata> {
        self.attributes.resolve(layer)
    }

    // ========================================================================
    // Ingest
    // ========================================================================

    /// Ingest through `reader` with the catalog's ingest defaults
    pub fn ingest<'r, R: RasterWindowReader>(&self, reader: &'r R, layout: LayoutDefinition) -> Ingest<'r, R> {
        let planner = match self.ingest.max_window {
            0 => WindowPlanner::whole(),
            max => WindowPlanner::new(max),
        };
        Ingest::new(reader, layout)
            .with_planner(planner)
            .with_workers(self.ingest.workers)
            .with_batch(self.ingest.batch)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Index method for layers written through [`Catalog::write`]
    pub fn default_index(&self) -> KeyIndexMethod {
        self.index
    }

    /// Directory of a file-backed catalog
    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref().map(FileBackend::root)
    }

    /// Check if the catalog was opened without a directory
    pub fn is_ephemeral(&self) -> bool {
        self.file.is_none()
    }

    /// fsync every log of a file-backed catalog
    ///
    /// A no-op for in-memory catalogs.
    pub fn flush(&self) -> Result<()> {
        if let Some(file) = &self.file {
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Builder for catalog configuration
///
/// ```
/// use tessera::prelude::*;
///
/// let dir = tempfile::tempdir().unwrap();
/// let catalog = Catalog::builder()
///     .path(dir.path())
///     .sync(SyncMode::None)
///     .index(KeyIndexMethod::RowMajor)
///     .open()
///     .unwrap();
/// assert_eq!(catalog.path(), Some(dir.path()));
/// assert_eq!(catalog.default_index(), KeyIndexMethod::RowMajor);
/// ```
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    path: Option<PathBuf>,
    sync: SyncMode,
    index: KeyIndexMethod,
    ingest: IngestConfig,
    recover: bool,
}

impl CatalogBuilder {
    /// In-memory catalog, Z-curve index, strict sync once a path is set
    pub fn new() -> Self {
        Self {
            path: None,
            sync: SyncMode::default(),
            index: KeyIndexMethod::default(),
            ingest: IngestConfig::default(),
            recover: true,
        }
    }

    /// Builder preloaded from `config`
    ///
    /// # Errors
    /// `InvalidConfig` if the sync setting does not parse
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let mut builder = Self::new()
            .index(config.index)
            .workers(config.ingest.workers)
            .max_window(config.ingest.max_window)
            .batch(config.ingest.batch)
            .sync(config.storage.sync_mode()?);
        if let StorageConfig::File { path, .. } = &config.storage {
            builder = builder.path(path);
        }
        Ok(builder)
    }

    /// Persist under `path`
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// fsync policy of a file-backed catalog
    pub fn sync(mut self, mode: SyncMode) -> Self {
        self.sync = mode;
        self
    }

    /// Default index method
    pub fn index(mut self, method: KeyIndexMethod) -> Self {
        self.index = method;
        self
    }

    /// Ingest worker threads
    pub fn workers(mut self, workers: usize) -> Self {
        self.ingest.workers = workers.max(1);
        self
    }

    /// Largest ingest window side; `0` reads rasters whole
    pub fn max_window(mut self, max_window: u32) -> Self {
        self.ingest.max_window = max_window;
        self
    }

    /// Windows decoded per ingest write batch
    pub fn batch(mut self, windows: usize) -> Self {
        self.ingest.batch = windows.max(1);
        self
    }

    /// Leave interrupted reindexes alone on open
    pub fn skip_recovery(mut self) -> Self {
        self.recover = false;
        self
    }

    /// Open the catalog
    ///
    /// # Errors
    /// - `Storage` if the file backend cannot be opened
    /// - anything [`LayerReindexer::recover_all`] raises, unless recovery
    ///   is skipped
    pub fn open(self) -> Result<Catalog> {
        let file = match &self.path {
            Some(path) => Some(Arc::new(FileBackend::open(path, self.sync)?)),
            None => None,
        };
        let backend: Arc<dyn Backend> = match &file {
            Some(file) => file.clone(),
            None => Arc::new(MemoryBackend::new()),
        };

        let catalog = Catalog {
            attributes: AttributeStore::new(backend),
            file,
            index: self.index,
            ingest: self.ingest,
        };

        if self.recover {
            for (layer, outcome) in catalog.reindexer().recover_all()? {
                if outcome != Recovery::Clean {
                    warn!(layer = %layer, %outcome, "Recovered interrupted reindex");
                }
            }
        }

        info!(
            path = ?catalog.path(),
            index = %catalog.index,
            layers = catalog.layers()?.len(),
            "Opened catalog"
        );
        Ok(catalog)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
