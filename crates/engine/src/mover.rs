//! Layer moves: copy, then delete the source

use crate::attributes::AttributeStore;
use crate::copier::LayerCopier;
use crate::deleter::LayerDeleter;
use tessera_core::{CompositeStage, LayerId, Result, WriteProgress};
use tracing::{info, warn};

/// Moves layers to a new identifier
#[derive(Debug, Clone)]
pub struct LayerMover {
    copier: LayerCopier,
    deleter: LayerDeleter,
}

impl LayerMover {
    /// Create a mover over `attributes`
    pub fn new(attributes: AttributeStore) -> Self {
        Self {
            copier: LayerCopier::new(attributes.clone()),
            deleter: LayerDeleter::new(attributes),
        }
    }

    /// Move `src` to `dst`
    ///
    /// # Errors
    /// - everything [`LayerCopier::copy`] raises; the source is untouched
    /// - `PartialWrite` at stage `DeleteSource` if the copy succeeded but the
    ///   source could not be deleted. The data then exists under both names;
    ///   retrying [`LayerDeleter::delete`] on the source finishes the move.
    pub fn move_layer(&self, src: &LayerId, dst: &LayerId) -> Result<WriteProgress> {
        let progress = self.copier.copy(src, dst)?;
        if let Err(e) = self.deleter.delete(src) {
            warn!(src = %src, dst = %dst, error = %e, "Moved layer but source delete failed");
            return Err(e.into_partial(CompositeStage::DeleteSource, progress));
        }
        info!(src = %src, dst = %dst, records = progress.records_written, "Moved layer");
        Ok(progress)
    }
}
