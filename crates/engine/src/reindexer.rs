//! Layer reindexing
//!
//! A reindex copies the layer to a temporary name under the new index,
//! deletes the original, then moves the temporary layer back. A
//! [`ReindexMarker`] in the metadata table tracks the step reached:
//!
//! | Stage | Original | Recovery |
//! |-------|----------|----------|
//! | `Copying` | intact | roll back: drop the temporary layer |
//! | `Swapping` | being replaced | roll forward: finish the replacement |
//!
//! While a marker exists, writes and new reindexes of the layer are refused
//! with `ReindexPending`.

use crate::attributes::{AttributeStore, ReindexMarker, ReindexStage};
use crate::copier::LayerCopier;
use crate::deleter::LayerDeleter;
use std::fmt;
use tessera_core::{CompositeStage, Error, LayerId, Result, WriteProgress};
use tessera_index::{IndexConfig, KeyIndexMethod};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of recovering one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No reindex was pending
    Clean,
    /// The interrupted reindex was undone; the original index is kept
    RolledBack,
    /// The interrupted reindex was completed
    RolledForward,
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recovery::Clean => f.write_str("clean"),
            Recovery::RolledBack => f.write_str("rolled back"),
            Recovery::RolledForward => f.write_str("rolled forward"),
        }
    }
}

/// Moves layers onto a new key index
#[derive(Debug, Clone)]
pub struct LayerReindexer {
    attributes: AttributeStore,
    copier: LayerCopier,
    deleter: LayerDeleter,
}

impl LayerReindexer {
    /// Create a reindexer over `attributes`
    pub fn new(attributes: AttributeStore) -> Self {
        Self {
            copier: LayerCopier::new(attributes.clone()),
            deleter: LayerDeleter::new(attributes.clone()),
            attributes,
        }
    }

    /// Rewrite `layer` under a `method` index spanning its recorded bounds
    ///
    /// Reindexing to the current index is a no-op. The layer stays readable
    /// while it is copied; once the swap starts, reads fail with
    /// `ReindexPending` until it completes.
    ///
    /// # Errors
    /// - `ReindexPending` if an earlier reindex of the layer needs recovery
    /// - `LayerNotFound` if the layer does not exist
    /// - `InvalidConfig` if `method` does not apply to the layer's keys
    /// - `PartialWrite` at stage `Reindex` if a step failed. If the copy
    ///   failed and was rolled back, the layer is unchanged; otherwise the
    ///   marker is left for [`LayerReindexer::recover`].
    pub fn reindex(&self, layer: &LayerId, method: KeyIndexMethod) -> Result<WriteProgress> {
        if self.attributes.read_marker(layer)?.is_some() {
            return Err(Error::ReindexPending {
                layer: layer.clone(),
            });
        }
        let meta = self.attributes.lookup(layer)?;
        let index = IndexConfig {
            method,
            span: meta.index.span,
        };
        meta.check_index(&index)?;
        if index == meta.index {
            debug!(layer = %layer, index = %method, "Layer already uses requested index");
            return Ok(WriteProgress::new(layer.clone()));
        }

        // Fixed length, so it registers whenever the original did
        let temp = LayerId::new(format!("reindex-{}", Uuid::new_v4().simple()), layer.zoom);
        let mut marker = ReindexMarker {
            layer: layer.clone(),
            temp: temp.clone(),
            stage: ReindexStage::Copying,
            index,
        };
        self.attributes.write_marker(&marker)?;

        if let Err(e) = self.copier.copy_with(layer, &temp, method) {
            let progress = e.progress().cloned().unwrap_or_else(|| WriteProgress::new(temp.clone()));
            match self.roll_back(&marker) {
                Ok(()) => warn!(layer = %layer, error = %e, "Reindex copy failed, rolled back"),
                Err(rollback) => warn!(
                    layer = %layer,
                    error = %e,
                    rollback = %rollback,
                    "Reindex copy failed and rollback failed, recovery pending"
                ),
            }
            return Err(e.into_partial(CompositeStage::Reindex, progress));
        }

        marker.stage = ReindexStage::Swapping;
        self.attributes.write_marker(&marker)?;
        let progress = match self.swap(&marker) {
            Ok(progress) => progress,
            Err(e) => {
                warn!(layer = %layer, error = %e, "Reindex swap failed, recovery pending");
                let progress = e.progress().cloned().unwrap_or_else(|| WriteProgress::new(layer.clone()));
                return Err(e.into_partial(CompositeStage::Reindex, progress));
            }
        };
        self.attributes.clear_marker(layer)?;
        info!(layer = %layer, from = %meta.index.method, to = %method, "Reindexed layer");
        Ok(progress)
    }

    /// Finish or undo an interrupted reindex of `layer`
    ///
    /// # Errors
    /// Backend failures; the marker stays and recovery can be retried
    pub fn recover(&self, layer: &LayerId) -> Result<Recovery> {
        let marker = match self.attributes.read_marker(layer)? {
            Some(marker) => marker,
            None => return Ok(Recovery::Clean),
        };
        let outcome = match marker.stage {
            ReindexStage::Copying => {
                self.roll_back(&marker)?;
                Recovery::RolledBack
            }
            ReindexStage::Swapping => {
                self.swap(&marker)?;
                self.attributes.clear_marker(layer)?;
                Recovery::RolledForward
            }
        };
        warn!(layer = %layer, temp = %marker.temp, outcome = %outcome, "Recovered interrupted reindex");
        Ok(outcome)
    }

    /// Recover every layer with a pending reindex
    pub fn recover_all(&self) -> Result<Vec<(LayerId, Recovery)>> {
        let mut outcomes = Vec::new();
        for marker in self.attributes.list_markers()? {
            let outcome = self.recover(&marker.layer)?;
            outcomes.push((marker.layer, outcome));
        }
        Ok(outcomes)
    }

    fn roll_back(&self, marker: &ReindexMarker) -> Result<()> {
        self.deleter.delete(&marker.temp)?;
        self.attributes.clear_marker(&marker.layer)?;
        Ok(())
    }

    /// Replace the original with the temporary layer
    ///
    /// The temporary layer's metadata is removed only once the original is a
    /// complete copy of it, so its presence means the swap must be redone.
    fn swap(&self, marker: &ReindexMarker) -> Result<WriteProgress> {
        let backend = self.attributes.backend();
        let temp_table = marker.temp.table_name();
        if !self.attributes.exists(&marker.temp)? {
            backend.drop_table(&temp_table)?;
            return Ok(WriteProgress::new(marker.layer.clone()));
        }
        self.deleter.delete(&marker.layer)?;
        let progress = self.copier.copy(&marker.temp, &marker.layer)?;
        self.attributes.delete(&marker.temp)?;
        backend.drop_table(&temp_table)?;
        Ok(progress)
    }
}
