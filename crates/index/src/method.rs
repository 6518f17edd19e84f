//! Index strategy configuration
//!
//! [`KeyIndexMethod`] names a strategy; [`IndexConfig`] pairs it with the key
//! bounds it was built for. The config is what layer metadata persists, so a
//! layer's index can be rebuilt exactly on every read.

use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_core::{Error, KeyBounds, KeySpan, LayerKey, Result};

/// Milliseconds in one day
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Named key index strategy plus its parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum KeyIndexMethod {
    /// Row-major order inside the layer bounds (spatial keys)
    RowMajor,
    /// Morton order over tile coordinates (spatial keys)
    #[default]
    ZCurve,
    /// Morton order over tile coordinates and time bins (space-time keys)
    ZCurveSpaceTime {
        /// Width of one time bin
        temporal_resolution_ms: i64,
    },
}

impl KeyIndexMethod {
    /// Space-time Z-curve with bins of `days` days
    pub fn by_days(days: i64) -> Self {
        KeyIndexMethod::ZCurveSpaceTime {
            temporal_resolution_ms: days * MILLIS_PER_DAY,
        }
    }

    /// Space-time Z-curve with bins of `millis` milliseconds
    pub fn by_millis(millis: i64) -> Self {
        KeyIndexMethod::ZCurveSpaceTime {
            temporal_resolution_ms: millis,
        }
    }
}

impl fmt::Display for KeyIndexMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyIndexMethod::RowMajor => f.write_str("row-major"),
            KeyIndexMethod::ZCurve => f.write_str("z-curve"),
            KeyIndexMethod::ZCurveSpaceTime {
                temporal_resolution_ms,
            } => write!(f, "z-curve-space-time({}ms)", temporal_resolution_ms),
        }
    }
}

/// Persisted description of a layer's key index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Strategy
    pub method: KeyIndexMethod,
    /// Key bounds the index was built for
    pub span: KeySpan,
}

impl IndexConfig {
    /// Describe an index of `method` over `bounds`
    pub fn new<K: LayerKey>(method: KeyIndexMethod, bounds: &KeyBounds<K>) -> Self {
        Self {
            method,
            span: K::span_of(bounds),
        }
    }

    /// Bounds typed as `K`
    ///
    /// # Errors
    /// `InvalidConfig` if the persisted span does not describe `K` bounds
    pub fn key_bounds<K: LayerKey>(&self) -> Result<KeyBounds<K>> {
        K::bounds_of(&self.span).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "index span {:?} does not describe {} keys",
                self.span,
                K::KEY_TYPE
            ))
        })
    }
}
