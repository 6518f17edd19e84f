//! Raster window readers
//!
//! A [`RasterWindowReader`] decodes a raster fully, one window, or a lazy
//! sequence of windows, and keys each result by its map footprint. The
//! result shape is chosen statically through a [`ReadShape`]:
//!
//! | Shape | Key | Value |
//! |-------|-----|-------|
//! | [`Singleband`] | `ProjectedExtent` | `Tile` |
//! | [`Multiband`] | `ProjectedExtent` | `MultibandTile` |
//! | [`TemporalSingleband`] | `TemporalProjectedExtent` | `Tile` |
//! | [`TemporalMultiband`] | `TemporalProjectedExtent` | `MultibandTile` |
//!
//! [`WindowReader`] implements the reader once for any codec and shape.

use crate::codec::{RasterInfo, TileCodec};
use crate::options::ReadOptions;
use crate::source::ByteSource;
use std::fmt;
use std::marker::PhantomData;
use tessera_core::{
    Error, Extent, GridBounds, MultibandTile, ProjectedExtent, Result, TemporalProjectedExtent,
    Tile, TileValue,
};
use tracing::{debug, warn};

// ============================================================================
// Shapes
// ============================================================================

/// Result shape of a read: how a decoded window is keyed and packaged
pub trait ReadShape: Send + Sync + 'static {
    /// Footprint key of one result
    type Key: Clone + fmt::Debug + Send + Sync + 'static;
    /// Decoded value of one result
    type Value: TileValue;

    /// Key for a window whose footprint is `extent`
    fn key(info: &RasterInfo, extent: Extent, options: &ReadOptions) -> Result<Self::Key>;

    /// Package decoded bands
    fn value(tile: MultibandTile) -> Result<Self::Value>;
}

/// One band, keyed by extent
#[derive(Debug, Clone, Copy, Default)]
pub struct Singleband;

/// All bands, keyed by extent
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiband;

/// One band, keyed by extent and acquisition time
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalSingleband;

/// All bands, keyed by extent and acquisition time
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalMultiband;

fn projected(info: &RasterInfo, extent: Extent, options: &ReadOptions) -> ProjectedExtent {
    ProjectedExtent::new(extent, options.resolve_crs(&info.crs))
}

fn temporal(
    info: &RasterInfo,
    extent: Extent,
    options: &ReadOptions,
) -> Result<TemporalProjectedExtent> {
    let instant = options.parse_time(&info.tags)?;
    Ok(TemporalProjectedExtent::new(
        extent,
        options.resolve_crs(&info.crs),
        instant,
    ))
}

fn first_band(tile: MultibandTile) -> Result<Tile> {
    tile.into_bands()
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidTile("decoded raster has no bands".to_string()))
}

impl ReadShape for Singleband {
    type Key = ProjectedExtent;
    type Value = Tile;

    fn key(info: &RasterInfo, extent: Extent, options: &ReadOptions) -> Result<Self::Key> {
        Ok(projected(info, extent, options))
    }

    fn value(tile: MultibandTile) -> Result<Self::Value> {
        first_band(tile)
    }
}

impl ReadShape for Multiband {
    type Key = ProjectedExtent;
    type Value = MultibandTile;

    fn key(info: &RasterInfo, extent: Extent, options: &ReadOptions) -> Result<Self::Key> {
        Ok(projected(info, extent, options))
    }

    fn value(tile: MultibandTile) -> Result<Self::Value> {
        Ok(tile)
    }
}

impl ReadShape for TemporalSingleband {
    type Key = TemporalProjectedExtent;
    type Value = Tile;

    fn key(info: &RasterInfo, extent: Extent, options: &ReadOptions) -> Result<Self::Key> {
        temporal(info, extent, options)
    }

    fn value(tile: MultibandTile) -> Result<Self::Value> {
        first_band(tile)
    }
}

impl ReadShape for TemporalMultiband {
    type Key = TemporalProjectedExtent;
    type Value = MultibandTile;

    fn key(info: &RasterInfo, extent: Extent, options: &ReadOptions) -> Result<Self::Key> {
        temporal(info, extent, options)
    }

    fn value(tile: MultibandTile) -> Result<Self::Value> {
        Ok(tile)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Full, single-window and multi-window raster reads
pub trait RasterWindowReader: Send + Sync {
    /// Footprint key of one result
    type Key: Clone + fmt::Debug + Send + Sync + 'static;
    /// Decoded value of one result
    type Value: TileValue;

    /// Parse the raster header
    ///
    /// # Errors
    /// `Codec` with the codec's error
    fn read_info(&self, source: ByteSource) -> Result<RasterInfo>;

    /// Decode the whole raster
    ///
    /// The key carries the raster's full extent, and the override CRS from
    /// `options` when one is set.
    ///
    /// # Errors
    /// `Codec` from the decoder; `MissingTag` or `Parse` for temporal shapes
    fn read_fully(&self, source: ByteSource, options: &ReadOptions)
        -> Result<(Self::Key, Self::Value)>;

    /// Decode exactly `window`
    ///
    /// # Errors
    /// `InvalidWindow` if `window` is malformed or leaves the raster, plus
    /// the errors of [`read_fully`](RasterWindowReader::read_fully)
    fn read_window(
        &self,
        source: ByteSource,
        window: GridBounds,
        options: &ReadOptions,
    ) -> Result<(Self::Key, Self::Value)>;

    /// Key `window` would be decoded under, without decoding it
    ///
    /// # Errors
    /// `MissingTag` or `Parse` for temporal shapes
    fn footprint(
        &self,
        info: &RasterInfo,
        window: &GridBounds,
        options: &ReadOptions,
    ) -> Result<Self::Key>;

    /// Decode `window` of a raster whose header was already parsed
    ///
    /// # Errors
    /// As [`read_window`](RasterWindowReader::read_window)
    fn read_window_from_info(
        &self,
        info: &RasterInfo,
        window: GridBounds,
        options: &ReadOptions,
    ) -> Result<(Self::Key, Self::Value)>;

    /// Lazily decode `windows` in order, dropping any outside the raster
    ///
    /// Each call to `next` decodes one window. The sequence ends after the
    /// first error.
    fn read_windows<'a>(
        &'a self,
        windows: Vec<GridBounds>,
        info: &'a RasterInfo,
        options: &'a ReadOptions,
    ) -> WindowIter<'a, Self>
    where
        Self: Sized,
    {
        WindowIter {
            reader: self,
            windows: windows.into_iter(),
            info,
            options,
            done: false,
        }
    }
}

/// Reader for codec `C` producing shape `S`
pub struct WindowReader<C, S> {
    codec: C,
    shape: PhantomData<fn() -> S>,
}

/// Single band, extent keyed
pub type SinglebandReader<C> = WindowReader<C, Singleband>;
/// All bands, extent keyed
pub type MultibandReader<C> = WindowReader<C, Multiband>;
/// Single band, extent and time keyed
pub type TemporalSinglebandReader<C> = WindowReader<C, TemporalSingleband>;
/// All bands, extent and time keyed
pub type TemporalMultibandReader<C> = WindowReader<C, TemporalMultiband>;

impl<C: TileCodec, S: ReadShape> WindowReader<C, S> {
    /// Read through `codec`
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            shape: PhantomData,
        }
    }

    /// Codec in use
    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<C: fmt::Debug, S> fmt::Debug for WindowReader<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowReader")
            .field("codec", &self.codec)
            .field("shape", &std::any::type_name::<S>())
            .finish()
    }
}

impl<C: Clone, S> Clone for WindowReader<C, S> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            shape: PhantomData,
        }
    }
}

impl<C: TileCodec, S: ReadShape> RasterWindowReader for WindowReader<C, S> {
    type Key = S::Key;
    type Value = S::Value;

    fn read_info(&self, source: ByteSource) -> Result<RasterInfo> {
        self.codec.decode_header(source).map_err(Error::Codec)
    }

    fn read_fully(
        &self,
        source: ByteSource,
        options: &ReadOptions,
    ) -> Result<(Self::Key, Self::Value)> {
        let info = self.read_info(source.clone())?;
        let key = S::key(&info, info.extent, options)?;
        let tile = self.codec.decode_full(source).map_err(Error::Codec)?;
        Ok((key, S::value(tile)?))
    }

    fn read_window(
        &self,
        source: ByteSource,
        window: GridBounds,
        options: &ReadOptions,
    ) -> Result<(Self::Key, Self::Value)> {
        let info = self.read_info(source)?;
        self.read_window_from_info(&info, window, options)
    }

    fn footprint(
        &self,
        info: &RasterInfo,
        window: &GridBounds,
        options: &ReadOptions,
    ) -> Result<Self::Key> {
        S::key(info, info.window_extent(window), options)
    }

    fn read_window_from_info(
        &self,
        info: &RasterInfo,
        window: GridBounds,
        options: &ReadOptions,
    ) -> Result<(Self::Key, Self::Value)> {
        if !info.contains_window(&window) {
            return Err(Error::InvalidWindow {
                window,
                cols: info.cols,
                rows: info.rows,
            });
        }
        let key = self.footprint(info, &window, options)?;
        let tile = self
            .codec
            .decode_window_from_info(info, &window)
            .map_err(Error::Codec)?;
        debug!(%window, "Decoded window");
        Ok((key, S::value(tile)?))
    }
}

/// Lazy sequence returned by [`RasterWindowReader::read_windows`]
///
/// Finite, single pass and not restartable; build a new one to read again.
pub struct WindowIter<'a, R: RasterWindowReader> {
    reader: &'a R,
    windows: std::vec::IntoIter<GridBounds>,
    info: &'a RasterInfo,
    options: &'a ReadOptions,
    done: bool,
}

impl<R: RasterWindowReader> Iterator for WindowIter<'_, R> {
    type Item = Result<(R::Key, R::Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for window in self.windows.by_ref() {
            if !self.info.contains_window(&window) {
                warn!(
                    %window,
                    cols = self.info.cols,
                    rows = self.info.rows,
                    "Dropping window outside raster"
                );
                continue;
            }
            let result = self.reader.read_window_from_info(self.info, window, self.options);
            if result.is_err() {
                self.done = true;
            }
            return Some(result);
        }
        self.done = true;
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, Some(self.windows.len()))
        }
    }
}

impl<R: RasterWindowReader> std::iter::FusedIterator for WindowIter<'_, R> {}
