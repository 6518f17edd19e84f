//! Positioned byte sources
//!
//! Windowed decodes need random access, and parallel extraction needs many
//! concurrent reads against one raster. A [`RangeReader`] therefore takes
//! `&self` and an explicit offset; there is no shared cursor.

use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Random-access, concurrency-safe byte source
pub trait RangeReader: Send + Sync + fmt::Debug {
    /// Total length in bytes
    fn len(&self) -> u64;

    /// Check if the source is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `len` bytes starting at `offset`
    ///
    /// # Errors
    /// `UnexpectedEof` if the range runs past the end of the source
    fn read_range(&self, offset: u64, len: usize) -> io::Result<Vec<u8>>;
}

/// Shared handle to a byte source
pub type ByteSource = Arc<dyn RangeReader>;

fn out_of_range(offset: u64, len: usize, total: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("range {}+{} past end of {}-byte source", offset, len, total),
    )
}

/// Byte source held in memory
#[derive(Clone)]
pub struct BytesReader {
    bytes: Arc<[u8]>,
}

impl BytesReader {
    /// Wrap a buffer
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Buffer a one-pass stream so it can be read by range
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::new(bytes))
    }

    /// Share as a [`ByteSource`]
    pub fn into_source(self) -> ByteSource {
        Arc::new(self)
    }
}

impl fmt::Debug for BytesReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytesReader")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl RangeReader for BytesReader {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_range(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let start = usize::try_from(offset).map_err(|_| out_of_range(offset, len, self.len()))?;
        start
            .checked_add(len)
            .and_then(|end| self.bytes.get(start..end))
            .map(|slice| slice.to_vec())
            .ok_or_else(|| out_of_range(offset, len, self.len()))
    }
}

/// File read through a pool of independent handles
///
/// Each read checks a handle out of the pool (opening a new one when the
/// pool is empty), so concurrent reads never share a cursor.
pub struct FileRangeReader {
    path: PathBuf,
    len: u64,
    idle: Mutex<Vec<File>>,
    max_idle: usize,
}

impl FileRangeReader {
    /// Idle handles kept by [`FileRangeReader::open`]
    pub const DEFAULT_MAX_IDLE: usize = 8;

    /// Open `path`
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_pool(path, Self::DEFAULT_MAX_IDLE)
    }

    /// Open `path`, keeping at most `max_idle` handles between reads
    pub fn with_pool(path: impl AsRef<Path>, max_idle: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        debug!(path = %path.display(), len, "Opened file range reader");
        Ok(Self {
            path,
            len,
            idle: Mutex::new(vec![file]),
            max_idle: max_idle.max(1),
        })
    }

    /// Path being read
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Share as a [`ByteSource`]
    pub fn into_source(self) -> ByteSource {
        Arc::new(self)
    }

    fn checkout(&self) -> io::Result<File> {
        match self.idle.lock().pop() {
            Some(file) => Ok(file),
            None => File::open(&self.path),
        }
    }

    fn checkin(&self, file: File) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(file);
        }
    }

    #[cfg(test)]
    fn idle_handles(&self) -> usize {
        self.idle.lock().len()
    }
}

impl fmt::Debug for FileRangeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRangeReader")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

impl RangeReader for FileRangeReader {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let in_range = offset
            .checked_add(len as u64)
            .map_or(false, |end| end <= self.len);
        if !in_range {
            return Err(out_of_range(offset, len, self.len));
        }
        let mut file = self.checkout()?;
        let mut buf = vec![0u8; len];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        self.checkin(file);
        Ok(buf)
    }
}
