//! On-disk byte formats
//!
//! Keeping encoding apart from the backend logic keeps format changes in
//! one place.
//!
//! # Module Structure
//!
//! - `log_entry`: framing of one append-only log entry

pub mod log_entry;

pub use log_entry::{id_key, parse_id_key, LogEntry, LogEntryError, LogOp, ENTRY_OVERHEAD};
