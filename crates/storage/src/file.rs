//! File backed tables
//!
//! Every table has one append-only log under `<root>/tables/`, named by the
//! hex encoding of the table name; metadata documents share
//! `<root>/meta.log`. Reads are served from an in-memory
//! [`MemoryBackend`] image rebuilt at open by replaying the logs.
//!
//! ## Write path
//!
//! An operation is appended to its log before the image changes, under the
//! table's log lock. A crash can therefore leave at most a torn final entry,
//! which replay detects (short read or CRC mismatch), logs, and truncates.

use crate::backend::{Backend, StorageError, StorageResult};
use crate::durability::SyncMode;
use crate::format::{id_key, parse_id_key, LogEntry, LogOp};
use crate::sharded::MemoryBackend;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLES_DIR: &str = "tables";
const META_LOG: &str = "meta.log";
const LOG_EXT: &str = "log";

/// Open append handle of one log
#[derive(Debug)]
struct LogFile {
    file: File,
    pending: usize,
}

impl LogFile {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file, pending: 0 })
    }

    fn append(&mut self, entry: &LogEntry, mode: SyncMode) -> io::Result<()> {
        self.file.write_all(&entry.encode())?;
        self.pending += 1;
        if mode.should_sync(self.pending) {
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.pending > 0 {
            self.file.sync_data()?;
            self.pending = 0;
        }
        Ok(())
    }
}

/// Backend persisting every table as an append-only log
///
/// # Example
///
/// ```
/// use tessera_storage::{Backend, FileBackend, SyncMode};
///
/// let dir = tempfile::tempdir().unwrap();
/// {
///     let store = FileBackend::open(dir.path(), SyncMode::None).unwrap();
///     store.put("roads:3", 7, b"tile".to_vec()).unwrap();
/// }
/// let store = FileBackend::open(dir.path(), SyncMode::None).unwrap();
/// assert_eq!(store.get("roads:3", 7).unwrap(), Some(b"tile".to_vec()));
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    mode: SyncMode,
    image: MemoryBackend,
    logs: DashMap<String, Arc<Mutex<LogFile>>>,
    meta_log: Mutex<LogFile>,
}

impl FileBackend {
    /// Open (or create) the catalog directory at `root` and replay its logs
    ///
    /// # Errors
    ///
    /// `Io` if the directory or a log cannot be read, `Malformed` if an
    /// intact entry carries a key its log cannot hold.
    pub fn open(root: impl AsRef<Path>, mode: SyncMode) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        let tables_dir = root.join(TABLES_DIR);
        fs::create_dir_all(&tables_dir)?;

        let image = MemoryBackend::new();

        let meta_path = root.join(META_LOG);
        replay(&meta_path, |entry| apply_meta(&image, entry))?;

        let mut tables = 0usize;
        for dir_entry in fs::read_dir(&tables_dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXT) {
                continue;
            }
            let Some(table) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_table_name)
            else {
                warn!(path = %path.display(), "Skipping log with undecodable name");
                continue;
            };
            replay(&path, |entry| apply_table(&image, &table, entry))?;
            tables += 1;
        }

        info!(
            root = %root.display(),
            tables,
            records = image.total_records(),
            %mode,
            "Opened file backend"
        );

        Ok(Self {
            meta_log: Mutex::new(LogFile::open(&meta_path)?),
            root,
            mode,
            image,
            logs: DashMap::new(),
        })
    }

    /// Directory this backend lives in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sync policy in effect
    pub fn sync_mode(&self) -> SyncMode {
        self.mode
    }

    /// fsync every log with unsynced appends
    pub fn sync_all(&self) -> StorageResult<()> {
        for log in self.logs.iter() {
            log.value().lock().sync()?;
        }
        self.meta_log.lock().sync()?;
        Ok(())
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root
            .join(TABLES_DIR)
            .join(format!("{}.{}", encode_table_name(table), LOG_EXT))
    }

    fn table_log(&self, table: &str) -> StorageResult<Arc<Mutex<LogFile>>> {
        if let Some(log) = self.logs.get(table) {
            return Ok(Arc::clone(log.value()));
        }
        match self.logs.entry(table.to_string()) {
            Entry::Occupied(occupied) => Ok(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                let log = Arc::new(Mutex::new(LogFile::open(&self.table_path(table))?));
                vacant.insert(Arc::clone(&log));
                Ok(log)
            }
        }
    }
}

impl Backend for FileBackend {
    fn get(&self, table: &str, id: u64) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.image.get_record(table, id))
    }

    fn range_scan(&self, table: &str, start: u64, end: u64) -> StorageResult<Vec<(u64, Vec<u8>)>> {
        Ok(self.image.scan(table, start, end))
    }

    fn put(&self, table: &str, id: u64, value: Vec<u8>) -> StorageResult<()> {
        let log = self.table_log(table)?;
        let mut log = log.lock();
        let entry = LogEntry::put(id_key(id).to_vec(), value);
        log.append(&entry, self.mode)?;
        self.image.insert(table, id, entry.value);
        Ok(())
    }

    fn delete(&self, table: &str, id: u64) -> StorageResult<bool> {
        if self.image.len_of(table) == 0 {
            return Ok(false);
        }
        let log = self.table_log(table)?;
        let mut log = log.lock();
        if self.image.get_record(table, id).is_none() {
            return Ok(false);
        }
        log.append(&LogEntry::delete(id_key(id).to_vec()), self.mode)?;
        Ok(self.image.remove(table, id))
    }

    fn delete_range(&self, table: &str, start: u64, end: u64) -> StorageResult<usize> {
        if start > end || self.image.len_of(table) == 0 {
            return Ok(0);
        }
        let log = self.table_log(table)?;
        let mut log = log.lock();
        log.append(&LogEntry::delete_range(start, end), self.mode)?;
        Ok(self.image.remove_range(table, start, end))
    }

    fn drop_table(&self, table: &str) -> StorageResult<bool> {
        let log = self.logs.remove(table).map(|(_, log)| log);
        let _guard = log.as_ref().map(|log| log.lock());
        match fs::remove_file(self.table_path(table)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let existed = self.image.remove_table(table);
        debug!(table, existed, "Dropped table");
        Ok(existed)
    }

    fn table_len(&self, table: &str) -> StorageResult<usize> {
        Ok(self.image.len_of(table))
    }

    fn tables(&self) -> StorageResult<Vec<String>> {
        Ok(self.image.table_names())
    }

    fn meta_get(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.image.meta_read(name))
    }

    fn meta_put(&self, name: &str, value: Vec<u8>) -> StorageResult<()> {
        let mut log = self.meta_log.lock();
        let entry = LogEntry::put(name.as_bytes().to_vec(), value);
        log.append(&entry, self.mode)?;
        self.image.meta_write(name, entry.value);
        Ok(())
    }

    fn meta_delete(&self, name: &str) -> StorageResult<bool> {
        let mut log = self.meta_log.lock();
        if self.image.meta_read(name).is_none() {
            return Ok(false);
        }
        log.append(&LogEntry::delete(name.as_bytes().to_vec()), self.mode)?;
        Ok(self.image.meta_remove(name))
    }

    fn meta_list(&self) -> StorageResult<Vec<String>> {
        Ok(self.image.meta_names())
    }
}

// ============================================================================
// Replay
// ============================================================================

/// Apply every intact entry of the log at `path`, truncating a damaged tail
fn replay(
    path: &Path,
    mut apply: impl FnMut(LogEntry) -> StorageResult<()>,
) -> StorageResult<usize> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut offset = 0usize;
    let mut applied = 0usize;
    while offset < bytes.len() {
        match LogEntry::decode(&bytes[offset..]) {
            Ok((entry, used)) => {
                apply(entry)?;
                offset += used;
                applied += 1;
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    offset,
                    dropped_bytes = bytes.len() - offset,
                    %error,
                    "Truncating damaged log tail"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(offset as u64)?;
                file.sync_all()?;
                break;
            }
        }
    }
    debug!(path = %path.display(), applied, "Replayed log");
    Ok(applied)
}

fn apply_table(image: &MemoryBackend, table: &str, entry: LogEntry) -> StorageResult<()> {
    let malformed = |reason: &str| StorageError::Malformed {
        table: table.to_string(),
        reason: reason.to_string(),
    };
    let id = parse_id_key(&entry.key).ok_or_else(|| malformed("key is not an identifier"))?;
    match entry.op {
        LogOp::Put => image.insert(table, id, entry.value),
        LogOp::Delete => {
            image.remove(table, id);
        }
        LogOp::DeleteRange => {
            let end = parse_id_key(&entry.value)
                .ok_or_else(|| malformed("range end is not an identifier"))?;
            image.remove_range(table, id, end);
        }
    }
    Ok(())
}

fn apply_meta(image: &MemoryBackend, entry: LogEntry) -> StorageResult<()> {
    let name = String::from_utf8(entry.key).map_err(|_| StorageError::Malformed {
        table: META_LOG.to_string(),
        reason: "document name is not UTF-8".to_string(),
    })?;
    match entry.op {
        LogOp::Put => image.meta_write(&name, entry.value),
        LogOp::Delete => {
            image.meta_remove(&name);
        }
        LogOp::DeleteRange => {
            return Err(StorageError::Malformed {
                table: META_LOG.to_string(),
                reason: "range delete in metadata log".to_string(),
            })
        }
    }
    Ok(())
}

// ============================================================================
// Table names
// ============================================================================

fn encode_table_name(table: &str) -> String {
    table.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn decode_table_name(stem: &str) -> Option<String> {
    if stem.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..stem.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(stem.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
