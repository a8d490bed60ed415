//! Deterministic address translation from cover ids to shard slots, on-disk
//! index/archive filenames, and remote archive item names.
//!
//! Every name built here is a join key against real filenames in the shard
//! store or the remote archive, so the formatting must be reproduced
//! bit-exactly. All functions are total over non-negative ids.

use crate::models::size::SizeClass;
use std::path::PathBuf;

/// Number of covers bucketed into one shard (and one remote archive item).
pub const ITEMS_PER_SHARD: i64 = 10_000;

/// Position of a cover inside its shard. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardDescriptor {
    pub shard: i64,
    pub slot: usize,
}

/// `shard = id / 10_000`, `slot = id % 10_000`.
pub fn shard_of(id: i64) -> ShardDescriptor {
    ShardDescriptor {
        shard: id / ITEMS_PER_SHARD,
        slot: (id % ITEMS_PER_SHARD) as usize,
    }
}

/// Base name shared by a shard's index and archive files, e.g.
/// `s_covers_0000_01` for shard 1 of the small renditions. The shard number
/// is zero-padded to six digits and split four-plus-two.
fn shard_file_stem(shard: i64, size: SizeClass) -> (String, String) {
    let name = format!("{:06}", shard);
    let item = format!("{}covers_{}", size.item_prefix(), &name[..4]);
    let stem = format!("{}_{}", item, &name[4..6]);
    (item, stem)
}

/// Path of the shard index artifact, relative to the data root:
/// `items/{prefix}covers_{aaaa}/{prefix}covers_{aaaa}_{bb}.index`.
pub fn index_path(shard: i64, size: SizeClass) -> PathBuf {
    let (item, stem) = shard_file_stem(shard, size);
    PathBuf::from("items").join(item).join(format!("{}.index", stem))
}

/// Path of the sealed tar archive the index describes, relative to the
/// data root. Sits next to its index file.
pub fn archive_path(shard: i64, size: SizeClass) -> PathBuf {
    let (item, stem) = shard_file_stem(shard, size);
    PathBuf::from("items").join(item).join(format!("{}.tar", stem))
}

/// Download URL for a cover in the legacy densely-tarred range.
///
/// Items group ids by the first four digits, tars by the next two, and the
/// entry carries the ten-digit id:
/// `{base}/covers_8500/covers_8500_00.tar/0008500000.jpg`.
pub fn legacy_tar_url(base: &str, id: i64, size: SizeClass) -> String {
    let prefix = size.item_prefix();
    let digits = format!("{:07}", id);
    let item = format!("{}covers_{}", prefix, &digits[..4]);
    let tar = format!("{}_{}.tar", item, &digits[4..6]);
    let entry = format!("{:010}{}.jpg", id, size.entry_suffix());
    format!("{}/{}/{}/{}", base, item, tar, entry)
}

/// Download URL for a cover migrated to the remote cluster, where groups of
/// [`ITEMS_PER_SHARD`] covers share one zip item.
pub fn cluster_url(base: &str, id: i64, size: SizeClass) -> String {
    let item = format!("olcovers{}", id / ITEMS_PER_SHARD);
    let zip = format!("{}{}.zip", item, size.entry_suffix());
    let entry = format!("{}{}.jpg", id, size.entry_suffix());
    format!("{}/{}/{}/{}", base, item, zip, entry)
}
