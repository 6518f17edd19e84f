//! Layer deletion
//!
//! Tile records go first, metadata last, so an interrupted delete leaves a
//! registered but partially emptied layer that the next delete finishes.

use crate::attributes::AttributeStore;
use tessera_core::{LayerId, Result};
use tracing::info;

/// Removes layers
#[derive(Debug, Clone)]
pub struct LayerDeleter {
    attributes: AttributeStore,
}

impl LayerDeleter {
    /// Create a deleter over `attributes`
    pub fn new(attributes: AttributeStore) -> Self {
        Self { attributes }
    }

    /// Remove every record of `layer` and its metadata
    ///
    /// Deleting a layer that does not exist is a no-op. Returns whether
    /// anything was removed.
    pub fn delete(&self, layer: &LayerId) -> Result<bool> {
        let dropped = self.attributes.backend().drop_table(&layer.table_name())?;
        let unregistered = self.attributes.delete(layer)?;
        if dropped || unregistered {
            info!(layer = %layer, "Deleted layer");
        }
        Ok(dropped || unregistered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{grid_records, header, memory_store};
    use crate::writer::{LayerWriter, WriteMode};
    use tessera_index::KeyIndexMethod;

    #[test]
    fn test_delete_removes_records_and_metadata() {
        let store = memory_store();
        let layer = LayerId::new("dem", 1);
        LayerWriter::new(store.clone())
            .write(&layer, header(), KeyIndexMethod::ZCurve, grid_records(3, 3), WriteMode::Create)
            .unwrap();

        assert!(LayerDeleter::new(store.clone()).delete(&layer).unwrap());

        assert!(!store.exists(&layer).unwrap());
        assert_eq!(store.backend().table_len(&layer.table_name()).unwrap(), 0);
    }

    #[test]
    fn test_delete_missing_layer_is_noop() {
        let deleter = LayerDeleter::new(memory_store());
        assert!(!deleter.delete(&LayerId::new("ghost", 0)).unwrap());
        assert!(!deleter.delete(&LayerId::new("ghost", 0)).unwrap());
    }

    #[test]
    fn test_delete_leaves_other_layers() {
        let store = memory_store();
        let writer = LayerWriter::new(store.clone());
        let keep = LayerId::new("dem", 2);
        let drop = LayerId::new("dem", 1);
        for layer in [&keep, &drop] {
            writer
                .write(layer, header(), KeyIndexMethod::ZCurve, grid_records(2, 2), WriteMode::Create)
                .unwrap();
        }

        LayerDeleter::new(store.clone()).delete(&drop).unwrap();

        assert_eq!(store.list().unwrap(), vec![keep.clone()]);
        assert_eq!(store.backend().table_len(&keep.table_name()).unwrap(), 4);
    }
}
