//! Log entry framing
//!
//! ```text
//! +--------+-----------+---------+-------------+---------+---------+
//! | op: u8 | klen: u32 | key     | vlen: u32   | value   | crc: u32|
//! +--------+-----------+---------+-------------+---------+---------+
//! ```
//!
//! Integers are big-endian. The CRC32 covers every byte before it. Table
//! logs key entries by the 8-byte big-endian identifier; the metadata log
//! keys them by document name.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use thiserror::Error;

/// Bytes an entry adds on top of its key and value
pub const ENTRY_OVERHEAD: usize = 1 + 4 + 4 + 4;

/// Mutation recorded by a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogOp {
    /// Store the value under the key
    Put = 1,
    /// Remove the key
    Delete = 2,
    /// Remove keys from the key to the identifier held in the value
    DeleteRange = 3,
}

impl LogOp {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(LogOp::Put),
            2 => Some(LogOp::Delete),
            3 => Some(LogOp::DeleteRange),
            _ => None,
        }
    }
}

/// Why an entry could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogEntryError {
    /// The buffer ends inside the entry
    #[error("incomplete entry: have {have} bytes, need {needed}")]
    Incomplete {
        /// Bytes available
        have: usize,
        /// Bytes the entry needs
        needed: usize,
    },
    /// The stored checksum does not match the entry bytes
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum found in the entry
        stored: u32,
        /// Checksum of the entry bytes
        computed: u32,
    },
    /// Unknown op byte
    #[error("unknown op {0}")]
    UnknownOp(u8),
}

/// One framed log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Mutation
    pub op: LogOp,
    /// Identifier or document name bytes
    pub key: Vec<u8>,
    /// Payload, empty for deletes
    pub value: Vec<u8>,
}

impl LogEntry {
    /// Put of `value` under `key`
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            op: LogOp::Put,
            key,
            value,
        }
    }

    /// Delete of `key`
    pub fn delete(key: Vec<u8>) -> Self {
        Self {
            op: LogOp::Delete,
            key,
            value: Vec::new(),
        }
    }

    /// Delete of identifiers `start..=end`
    pub fn delete_range(start: u64, end: u64) -> Self {
        Self {
            op: LogOp::DeleteRange,
            key: id_key(start).to_vec(),
            value: id_key(end).to_vec(),
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        ENTRY_OVERHEAD + self.key.len() + self.value.len()
    }

    /// Frame the entry
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.op as u8);
        // Writes into a Vec cannot fail.
        let _ = buf.write_u32::<BigEndian>(self.key.len() as u32);
        buf.extend_from_slice(&self.key);
        let _ = buf.write_u32::<BigEndian>(self.value.len() as u32);
        buf.extend_from_slice(&self.value);
        let crc = crc32fast::hash(&buf);
        let _ = buf.write_u32::<BigEndian>(crc);
        buf
    }

    /// Decode the entry at the start of `buf`
    ///
    /// Returns the entry and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// `Incomplete` when `buf` ends early (a torn append), otherwise
    /// `ChecksumMismatch` or `UnknownOp` for damaged bytes.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), LogEntryError> {
        let need = |needed: usize| {
            if buf.len() < needed {
                Err(LogEntryError::Incomplete {
                    have: buf.len(),
                    needed,
                })
            } else {
                Ok(())
            }
        };

        need(5)?;
        let key_len = BigEndian::read_u32(&buf[1..5]) as usize;
        let value_len_at = 5 + key_len;
        need(value_len_at + 4)?;
        let value_len = BigEndian::read_u32(&buf[value_len_at..value_len_at + 4]) as usize;
        let crc_at = value_len_at + 4 + value_len;
        need(crc_at + 4)?;

        let stored = BigEndian::read_u32(&buf[crc_at..crc_at + 4]);
        let computed = crc32fast::hash(&buf[..crc_at]);
        if stored != computed {
            return Err(LogEntryError::ChecksumMismatch { stored, computed });
        }
        let op = LogOp::from_byte(buf[0]).ok_or(LogEntryError::UnknownOp(buf[0]))?;

        let entry = LogEntry {
            op,
            key: buf[5..value_len_at].to_vec(),
            value: buf[value_len_at + 4..crc_at].to_vec(),
        };
        Ok((entry, crc_at + 4))
    }
}

/// Key bytes of a table identifier
pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Identifier held in key bytes, if they are exactly eight
pub fn parse_id_key(bytes: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
}
