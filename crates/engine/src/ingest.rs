//! Windowed ingest from a raster into layer records
//!
//! ## Design
//!
//! The pipeline is: parse the header once, plan windows aligned to the
//! raster's segments, decode each window through an explicitly supplied
//! [`RasterWindowReader`], and key each decoded footprint against a
//! [`LayoutDefinition`]. Windows whose footprint falls outside the layout are
//! skipped with a warning.
//!
//! Decodes are independent, so [`Ingest::run_parallel`] splits the window
//! list into contiguous shares and decodes each share on a scoped thread
//! against the same byte source. Results keep window order.
//!
//! [`Ingest::write`] never holds more than one batch of decoded windows. The
//! layer's key bounds are derived up front from window footprints alone, so
//! bounded indexes span the whole raster before the first batch is written.

use crate::writer::{LayerWriter, WriteMode};
use std::thread;
use tessera_core::{
    CellGrid, CompositeStage, FootprintKey, GridBounds, KeyBounds, LayerHeader, LayerId, LayerKey,
    LayoutDefinition, Result, WriteProgress,
};
use tessera_index::{IndexConfig, IndexableKey, KeyIndexMethod};
use tessera_raster::{ByteSource, RasterInfo, RasterWindowReader, ReadOptions, WindowPlanner};
use tracing::{debug, info, warn};

/// Windows decoded per write batch unless configured otherwise
pub const DEFAULT_BATCH: usize = 64;

/// Extraction of keyed records from one raster
///
/// # Example
///
/// ```
/// use tessera_core::{CellType, Crs, Extent, LayoutDefinition, SpatialKey, Tile};
/// use tessera_engine::Ingest;
/// use tessera_raster::{BytesReader, RawCodec, RawHeader, SinglebandReader, WindowPlanner};
///
/// let header = RawHeader {
///     cols: 8,
///     rows: 8,
///     seg_cols: 4,
///     seg_rows: 4,
///     band_count: 1,
///     cell_type: CellType::U8,
///     crs: Crs::WGS84,
///     extent: Extent::new(0.0, 0.0, 8.0, 8.0),
///     tags: Default::default(),
/// };
/// let band = Tile::new(8, 8, CellType::U8, vec![0; 64]).unwrap();
/// let source = BytesReader::new(RawCodec::encode(&header, &[band]).unwrap()).into_source();
///
/// let reader = SinglebandReader::new(RawCodec);
/// let layout = LayoutDefinition::for_raster(header.extent, 8, 8, 4);
/// let records: Vec<(SpatialKey, Tile)> = Ingest::new(&reader, layout)
///     .with_planner(WindowPlanner::new(4))
///     .run(source)
///     .unwrap();
/// assert_eq!(records.len(), 4);
/// ```
pub struct Ingest<'r, R> {
    reader: &'r R,
    layout: LayoutDefinition,
    planner: WindowPlanner,
    options: ReadOptions,
    workers: usize,
    batch: usize,
}

impl<'r, R: RasterWindowReader> Ingest<'r, R> {
    /// Ingest through `reader`, keying against `layout`
    ///
    /// Defaults to one window over the whole raster, default read options, a
    /// single worker and [`DEFAULT_BATCH`] windows per write.
    pub fn new(reader: &'r R, layout: LayoutDefinition) -> Self {
        Self {
            reader,
            layout,
            planner: WindowPlanner::whole(),
            options: ReadOptions::default(),
            workers: 1,
            batch: DEFAULT_BATCH,
        }
    }

    /// Plan windows with `planner`; segment sizes come from the raster
    pub fn with_planner(mut self, planner: WindowPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Decode with `options`
    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    /// Worker threads used by [`Ingest::write`]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Windows [`Ingest::write`] decodes before each layer write
    pub fn with_batch(mut self, windows: usize) -> Self {
        self.batch = windows.max(1);
        self
    }

    /// Layout records are keyed against
    pub fn layout(&self) -> &LayoutDefinition {
        &self.layout
    }

    /// Windows planned for the raster described by `info`
    pub fn plan(&self, info: &RasterInfo) -> Vec<GridBounds> {
        let planner = match self.planner.max_window() {
            Some(_) => self.planner.with_segments(info.seg_cols, info.seg_rows),
            None => self.planner,
        };
        planner.plan(info.cols, info.rows)
    }

    /// Decode and key every planned window on the calling thread
    ///
    /// # Errors
    /// The first error raised by the reader; nothing after it is decoded
    pub fn run<K>(&self, source: ByteSource) -> Result<Vec<(K, R::Value)>>
    where
        K: LayerKey,
        R::Key: FootprintKey<K>,
    {
        let info = self.reader.read_info(source)?;
        self.collect(self.plan(&info), &info, 1)
    }

    /// Decode and key every planned window on `workers` scoped threads
    ///
    /// # Errors
    /// The first error, in window order, raised by any worker
    pub fn run_parallel<K>(&self, source: ByteSource, workers: usize) -> Result<Vec<(K, R::Value)>>
    where
        K: LayerKey,
        R::Key: FootprintKey<K>,
    {
        let info = self.reader.read_info(source)?;
        self.collect(self.plan(&info), &info, workers)
    }

    /// Ingest the raster into `layer` through `writer`, one batch at a time
    ///
    /// The layer header takes its CRS from the read options or the raster,
    /// its cell type from the raster and its band count from the decoded
    /// values. Its index spans the keys of every planned window. The first
    /// batch is written with `mode`, later ones are appended.
    ///
    /// # Errors
    /// Reader errors, then everything [`LayerWriter::write_with_index`]
    /// raises. A failure after a batch was written is a `PartialWrite` at
    /// stage `Write` counting the records already stored; ingesting again
    /// with [`WriteMode::Append`] completes the layer.
    pub fn write<K>(
        &self,
        source: ByteSource,
        writer: &LayerWriter,
        layer: &LayerId,
        method: KeyIndexMethod,
        mode: WriteMode,
    ) -> Result<WriteProgress>
    where
        K: IndexableKey,
        R::Key: FootprintKey<K>,
    {
        let info = self.reader.read_info(source)?;
        let windows: Vec<GridBounds> = self
            .plan(&info)
            .into_iter()
            .filter(|window| info.contains_window(window))
            .collect();
        let Some(bounds) = self.key_bounds::<K>(&windows, &info)? else {
            let header = self.header(&info, info.band_count);
            return writer.write::<K, R::Value>(layer, header, method, Vec::new(), mode);
        };
        let index = IndexConfig::new(method, &bounds);
        info!(
            layer = %layer,
            windows = windows.len(),
            batch = self.batch,
            workers = self.workers,
            "Ingesting raster"
        );

        let mut total = WriteProgress::new(layer.clone());
        let mut header = None;
        let mut mode = mode;
        for chunk in windows.chunks(self.batch) {
            let written = self.collect::<K>(chunk.to_vec(), &info, self.workers).and_then(|records| {
                let Some((_, first)) = records.first() else {
                    return Ok(None);
                };
                let header = header
                    .get_or_insert_with(|| self.header(&info, CellGrid::band_count(first)))
                    .clone();
                writer
                    .write_with_index(layer, header, index, records, mode)
                    .map(Some)
            });
            match written {
                Ok(Some(progress)) => {
                    total.buckets_written += progress.buckets_written;
                    total.records_written += progress.records_written;
                    total.last_index = progress.last_index.or(total.last_index);
                    mode = WriteMode::Append;
                    debug!(layer = %layer, records = total.records_written, "Ingest batch written");
                }
                Ok(None) => {}
                Err(e) if total.records_written == 0 => return Err(e),
                Err(e) => return Err(e.into_partial(CompositeStage::Write, total)),
            }
        }
        Ok(total)
    }

    fn header(&self, info: &RasterInfo, band_count: usize) -> LayerHeader {
        LayerHeader::new(
            self.options.resolve_crs(&info.crs),
            info.cell_type,
            band_count,
            self.layout.clone(),
        )
    }

    /// Bounds of the keys `windows` map to, computed without decoding
    fn key_bounds<K>(&self, windows: &[GridBounds], info: &RasterInfo) -> Result<Option<KeyBounds<K>>>
    where
        K: LayerKey,
        R::Key: FootprintKey<K>,
    {
        let mut bounds: Option<KeyBounds<K>> = None;
        for window in windows {
            let footprint = self.reader.footprint(info, window, &self.options)?;
            if let Some(key) = footprint.layout_key(&self.layout) {
                match bounds.as_mut() {
                    Some(bounds) => bounds.include(&key),
                    None => bounds = Some(KeyBounds::new(key.clone(), key)),
                }
            }
        }
        Ok(bounds)
    }

    fn collect<K>(&self, windows: Vec<GridBounds>, info: &RasterInfo, workers: usize) -> Result<Vec<(K, R::Value)>>
    where
        K: LayerKey,
        R::Key: FootprintKey<K>,
    {
        let workers = workers.clamp(1, windows.len().max(1));
        debug!(windows = windows.len(), workers, "Decoding ingest windows");
        if workers == 1 {
            return self.extract(windows, info);
        }

        let share = windows.len().div_ceil(workers);
        let shares: Vec<Result<Vec<(K, R::Value)>>> = thread::scope(|s| {
            let handles: Vec<_> = windows
                .chunks(share)
                .map(|chunk| s.spawn(move || self.extract(chunk.to_vec(), info)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut records = Vec::new();
        for share in shares {
            records.extend(share?);
        }
        Ok(records)
    }

    fn extract<K>(&self, windows: Vec<GridBounds>, info: &RasterInfo) -> Result<Vec<(K, R::Value)>>
    where
        K: LayerKey,
        R::Key: FootprintKey<K>,
    {
        let mut records = Vec::with_capacity(windows.len());
        for decoded in self.reader.read_windows(windows, info, &self.options) {
            let (footprint, value) = decoded?;
            match footprint.layout_key(&self.layout) {
                Some(key) => records.push((key, value)),
                None => warn!(footprint = ?footprint, "Window footprint outside layout, skipped"),
            }
        }
        Ok(records)
    }
}
