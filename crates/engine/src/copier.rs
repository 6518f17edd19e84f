//! Layer copies
//!
//! ## Design
//!
//! A copy under the source's own index moves buckets verbatim: identifiers
//! do not change, so nothing is decoded beyond a record count. A copy under
//! another index decodes every key, regroups the records by their new
//! identifier, and writes the new buckets in ascending order.
//!
//! Either way the destination is written in ascending identifier order, so
//! the progress reported by a failed copy is a resume point for
//! [`LayerCopier::resume`]. A failed copy is never rolled back.

use crate::attributes::{AttributeStore, LayerMetadata};
use crate::bucket::Bucket;
use crate::writer::{group_by_index, put_buckets};
use tessera_core::{
    CompositeStage, Error, KeyType, LayerId, Result, SpaceTimeKey, SpatialKey, WriteProgress,
};
use tessera_index::{build_index, IndexConfig, IndexableKey, KeyIndexMethod};
use tracing::{debug, info};

/// Copies layers, optionally under a different key index
#[derive(Debug, Clone)]
pub struct LayerCopier {
    attributes: AttributeStore,
}

impl LayerCopier {
    /// Create a copier over `attributes`
    pub fn new(attributes: AttributeStore) -> Self {
        Self { attributes }
    }

    /// Copy every record of `src` into the new layer `dst`, same index
    ///
    /// # Errors
    /// - `LayerNotFound` if `src` does not exist
    /// - `LayerExists` if `dst` exists
    /// - `PartialWrite` at stage `Copy` if the backend failed partway; `dst`
    ///   is left incomplete and the progress says how far it got
    pub fn copy(&self, src: &LayerId, dst: &LayerId) -> Result<WriteProgress> {
        self.start(src, dst, None)
    }

    /// Copy `src` into the new layer `dst` under a `method` index
    ///
    /// The new index spans the source's recorded key bounds.
    ///
    /// # Errors
    /// As [`LayerCopier::copy`], plus `InvalidConfig` if `method` does not
    /// apply to the layer's key type
    pub fn copy_with(&self, src: &LayerId, dst: &LayerId, method: KeyIndexMethod) -> Result<WriteProgress> {
        self.start(src, dst, Some(method))
    }

    /// Continue a copy that failed with `progress`
    ///
    /// Buckets at or below `progress.last_index` are assumed written; the
    /// returned progress includes them.
    ///
    /// # Errors
    /// - `LayerNotFound` if either layer does not exist
    /// - `InvalidConfig` if `progress` belongs to another layer
    /// - `PartialWrite` as for [`LayerCopier::copy`]
    pub fn resume(&self, src: &LayerId, dst: &LayerId, progress: &WriteProgress) -> Result<WriteProgress> {
        if progress.layer != *dst {
            return Err(Error::InvalidConfig(format!(
                "progress of {} cannot resume a copy into {}",
                progress.layer, dst
            )));
        }
        let src_meta = self.attributes.resolve(src)?;
        let dst_meta = self.attributes.lookup(dst)?;
        info!(src = %src, dst = %dst, after = ?progress.last_index, "Resuming layer copy");
        self.transfer(&src_meta, &dst_meta, progress.clone())
    }

    fn start(&self, src: &LayerId, dst: &LayerId, method: Option<KeyIndexMethod>) -> Result<WriteProgress> {
        let src_meta = self.attributes.resolve(src)?;
        if self.attributes.exists(dst)? {
            return Err(Error::LayerExists { layer: dst.clone() });
        }
        let mut dst_meta = src_meta.renamed(dst.clone());
        if let Some(method) = method {
            let index = IndexConfig {
                method,
                span: src_meta.index.span,
            };
            src_meta.check_index(&index)?;
            dst_meta = dst_meta.reindexed(index);
        }
        self.attributes.register(&dst_meta, false)?;
        self.transfer(&src_meta, &dst_meta, WriteProgress::new(dst.clone()))
    }

    /// Write the records of `src` into `dst`, after `progress.last_index`
    pub(crate) fn transfer(
        &self,
        src: &LayerMetadata,
        dst: &LayerMetadata,
        mut progress: WriteProgress,
    ) -> Result<WriteProgress> {
        let resume_after = progress.last_index;
        let result = if src.index == dst.index {
            self.copy_buckets(&src.layer, &dst.layer, resume_after, &mut progress)
        } else {
            match src.key_type {
                KeyType::Spatial => self.regroup::<SpatialKey>(src, dst, resume_after, &mut progress),
                KeyType::SpaceTime => self.regroup::<SpaceTimeKey>(src, dst, resume_after, &mut progress),
            }
        };
        result.map_err(|e| e.into_partial(CompositeStage::Copy, progress.clone()))?;
        info!(
            src = %src.layer,
            dst = %dst.layer,
            index = %dst.index.method,
            records = progress.records_written,
            "Copied layer"
        );
        Ok(progress)
    }

    fn copy_buckets(
        &self,
        src: &LayerId,
        dst: &LayerId,
        resume_after: Option<u64>,
        progress: &mut WriteProgress,
    ) -> Result<()> {
        let start = match resume_after {
            None => 0,
            Some(last) => match last.checked_add(1) {
                Some(next) => next,
                None => return Ok(()),
            },
        };
        let backend = self.attributes.backend();
        let dst_table = dst.table_name();
        for (id, bytes) in backend.range_scan(&src.table_name(), start, u64::MAX)? {
            let count = Bucket::decode(&bytes)?.len();
            backend.put(&dst_table, id, bytes)?;
            progress.advance(id, count);
            debug!(dst = %dst, index = id, records = count, "Copied bucket");
        }
        Ok(())
    }

    fn regroup<K: IndexableKey>(
        &self,
        src: &LayerMetadata,
        dst: &LayerMetadata,
        resume_after: Option<u64>,
        progress: &mut WriteProgress,
    ) -> Result<()> {
        let index = build_index::<K>(&dst.index)?;
        let backend = self.attributes.backend();
        let mut entries = Vec::new();
        for (_, bytes) in backend.range_scan(&src.layer.table_name(), 0, u64::MAX)? {
            for entry in Bucket::decode(&bytes)?.into_entries() {
                entries.push((entry.key::<K>()?, entry));
            }
        }
        let groups = group_by_index(index.as_ref(), entries)?;
        put_buckets(backend.as_ref(), &dst.layer, groups, resume_after, progress, |bucket, (_, entry)| {
            bucket.upsert(entry);
            Ok(())
        })
    }
}
