//! Sync policy for file backed logs
//!
//! Every log append is flushed to the OS. The mode decides how often the
//! file is also fsynced.

/// When [`FileBackend`](crate::FileBackend) fsyncs its logs
///
/// | Mode | Survives | Use case |
/// |------|----------|----------|
/// | None | process crash | tests, scratch catalogs |
/// | Batched | OS crash, minus the last batch | bulk ingest |
/// | Strict | OS crash | catalogs other tools read |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Never fsync; the OS flushes on its own schedule
    None,
    /// fsync every `batch_size` appends to a log
    Batched {
        /// Appends between fsyncs
        batch_size: usize,
    },
    /// fsync after every append
    #[default]
    Strict,
}

impl SyncMode {
    /// Batched mode with 256 appends per fsync
    pub fn batched_default() -> Self {
        SyncMode::Batched { batch_size: 256 }
    }

    /// Whether a log that has seen `pending` unsynced appends must fsync now
    pub fn should_sync(&self, pending: usize) -> bool {
        match self {
            SyncMode::None => false,
            SyncMode::Strict => pending > 0,
            SyncMode::Batched { batch_size } => pending >= (*batch_size).max(1),
        }
    }

    /// Parse `none`, `strict`, `batched` or `batched:<n>`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Some(SyncMode::None),
            "strict" => Some(SyncMode::Strict),
            "batched" => Some(SyncMode::batched_default()),
            other => other
                .strip_prefix("batched:")
                .and_then(|n| n.parse().ok())
                .map(|batch_size| SyncMode::Batched { batch_size }),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::None => f.write_str("none"),
            SyncMode::Strict => f.write_str("strict"),
            SyncMode::Batched { batch_size } => write!(f, "batched:{}", batch_size),
        }
    }
}
