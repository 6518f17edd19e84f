//! Record buckets
//!
//! A bucket holds every record stored under one index identifier. Keys and
//! values are kept as individually encoded byte strings so that copies and
//! reindex recovery can move buckets without knowing the value type, and so
//! that two keys compare equal exactly when their encodings do.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tessera_core::{Error, Result};

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encoded form of a key, as compared inside a bucket
pub(crate) fn encode_key<K: Serialize>(key: &K) -> Result<Vec<u8>> {
    encode(key)
}

/// One encoded record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Entry {
    /// Encode a typed record
    pub fn encode<K: Serialize, V: Serialize>(key: &K, value: &V) -> Result<Self> {
        Ok(Self {
            key: encode(key)?,
            value: encode(value)?,
        })
    }

    pub fn key<K: DeserializeOwned>(&self) -> Result<K> {
        decode(&self.key)
    }

    pub fn value<V: DeserializeOwned>(&self) -> Result<V> {
        decode(&self.value)
    }
}

/// Records stored under one index identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Bucket {
    entries: Vec<Entry>,
}

impl Bucket {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }

    /// Decode the bucket stored at `bytes`, empty when there is none
    pub fn decode_opt(bytes: Option<Vec<u8>>) -> Result<Self> {
        match bytes {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(Self::default()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// Encoded value stored under `key`
    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Insert `entry`, replacing the record with the same key
    pub fn upsert(&mut self, entry: Entry) {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => existing.value = entry.value,
            None => self.entries.push(entry),
        }
    }

    /// Decode every record
    pub fn records<K: DeserializeOwned, V: DeserializeOwned>(&self) -> Result<Vec<(K, V)>> {
        self.entries
            .iter()
            .map(|e| Ok((e.key()?, e.value()?)))
            .collect()
    }
}

impl FromIterator<Entry> for Bucket {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut bucket = Bucket::default();
        for entry in iter {
            bucket.upsert(entry);
        }
        bucket
    }
}
