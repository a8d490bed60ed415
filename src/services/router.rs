//! Per-request routing between the local shard tier, the remote archive
//! tiers, and not-found.

use crate::models::cover::CoverRecord;
use crate::models::size::SizeClass;
use crate::services::metadata::{MetadataError, MetadataGateway};
use crate::services::shards::{self, shard_of};
use crate::services::tar_index::TarIndexCache;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Where the bytes for one resolved request live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobLocation {
    /// Byte range inside a sealed local shard archive.
    LocalShard {
        archive: PathBuf,
        offset: u64,
        length: u32,
    },
    /// Whole file on the local filesystem.
    LocalFile { path: PathBuf },
    /// Fully derived URL on a remote archive tier. Never probed before the
    /// redirect is issued; a bad target is the remote store's 404 to report.
    Redirect { url: String },
    /// Deny-listed id. Served exactly like `NotFound`.
    Blocked,
    NotFound,
}

/// Outcome of routing: the location plus the metadata record when the
/// decision consulted one. The record supplies cache validators.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub location: BlobLocation,
    pub record: Option<CoverRecord>,
}

impl Resolution {
    fn bare(location: BlobLocation) -> Self {
        Self {
            location,
            record: None,
        }
    }
}

/// Routing thresholds, fixed at construction.
///
/// The exact cutover numbers reflect deployment history (which id ranges
/// were batched into tars, which items have been migrated), so they are
/// configuration rather than hard invariants.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub blocked: HashSet<i64>,
    /// Ids below this live in the remote cluster; zero disables the tier.
    pub cluster_cutover: i64,
    /// Ids below this may have precomputed local shard indexes.
    pub local_index_limit: i64,
    /// Half-open id range served from remote legacy tars.
    pub legacy_tar_start: i64,
    pub legacy_tar_end: i64,
    pub archive_url: String,
}

/// Decides, per request, which tier serves a cover.
///
/// Stages run in order and the first match is terminal. Local shard-index
/// probing comes before the metadata lookup because nearly all historical
/// ids are covered by precomputed indexes, which keeps the metadata store
/// off the hot path; newer ids were never batched into shards and go
/// straight to the authoritative record.
pub struct TierRouter {
    cfg: RoutingConfig,
    data_root: PathBuf,
    index: TarIndexCache,
    metadata: MetadataGateway,
}

impl TierRouter {
    pub fn new(cfg: RoutingConfig, data_root: impl Into<PathBuf>, metadata: MetadataGateway) -> Self {
        let data_root = data_root.into();
        Self {
            index: TarIndexCache::new(&data_root),
            cfg,
            data_root,
            metadata,
        }
    }

    pub async fn resolve(&self, id: i64, size: SizeClass) -> Result<Resolution, MetadataError> {
        // 1. Deny list. Indistinguishable from a missing cover downstream.
        if self.cfg.blocked.contains(&id) {
            debug!(id, "blocked cover requested");
            return Ok(Resolution::bare(BlobLocation::Blocked));
        }

        // 2. Remote cluster cutover.
        if self.cfg.cluster_cutover > 0 && id < self.cfg.cluster_cutover {
            let url = shards::cluster_url(&self.cfg.archive_url, id, size);
            return Ok(Resolution::bare(BlobLocation::Redirect { url }));
        }

        // 3. Legacy densely-tarred range, always remote.
        if (self.cfg.legacy_tar_start..self.cfg.legacy_tar_end).contains(&id) {
            let url = shards::legacy_tar_url(&self.cfg.archive_url, id, size);
            return Ok(Resolution::bare(BlobLocation::Redirect { url }));
        }

        // 4. Local shard index fast path. Originals skip it: they were never
        // batched into derived-rendition shards.
        if id < self.cfg.local_index_limit && size.is_derived() {
            let d = shard_of(id);
            if let Some(table) = self.index.get(d.shard, size).await {
                if let Some((offset, length)) = table.lookup(d.slot) {
                    let archive = self.data_root.join(shards::archive_path(d.shard, size));
                    return Ok(Resolution::bare(BlobLocation::LocalShard {
                        archive,
                        offset,
                        length,
                    }));
                }
            }
        }

        // 5. Authoritative metadata record.
        if let Some(record) = self.metadata.details(id).await? {
            let location = self.locate_by_record(&record, size);
            return Ok(Resolution {
                location,
                record: Some(record),
            });
        }

        // 6. Never written, or written and since deleted.
        Ok(Resolution::bare(BlobLocation::NotFound))
    }

    /// Classify a metadata-backed cover: migrated rows redirect to the
    /// remote archive, everything else reads the stored path. A
    /// `path.tar:offset:length` triple addresses a byte range inside a
    /// batch archive.
    fn locate_by_record(&self, record: &CoverRecord, size: SizeClass) -> BlobLocation {
        if record.migrated_to_remote() {
            let url = shards::cluster_url(&self.cfg.archive_url, record.id, size);
            return BlobLocation::Redirect { url };
        }
        match record.filename_for(size) {
            Some(stored) => match parse_ranged_path(stored) {
                Some((path, offset, length)) => BlobLocation::LocalShard {
                    archive: self.data_root.join(path),
                    offset,
                    length,
                },
                None => BlobLocation::LocalFile {
                    path: self.data_root.join(stored),
                },
            },
            None => BlobLocation::NotFound,
        }
    }
}

/// Split a `path:offset:length` stored filename. Plain paths return `None`.
fn parse_ranged_path(stored: &str) -> Option<(&str, u64, u32)> {
    let (rest, length) = stored.rsplit_once(':')?;
    let (path, offset) = rest.rsplit_once(':')?;
    Some((path, offset.parse().ok()?, length.parse().ok()?))
}
