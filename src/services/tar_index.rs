//! Shard index artifacts: parsing and the process-wide table cache.
//!
//! Each sealed shard archive ships with a line-oriented `.index` file of
//! `<name>\t<offset>\t<length>` records. The leading ten digits of the name
//! field are the cover id; the slot inside the shard is `id % 10_000`.
//! Tables are immutable once a shard is sealed, so loaded tables are cached
//! for the life of the process and evicted only by restart.

use crate::models::size::SizeClass;
use crate::services::shards::{self, ITEMS_PER_SHARD};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Offsets and lengths for every slot of one `(shard, size)` pair.
///
/// A zero length means the cover is absent from this shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarIndexTable {
    offsets: Vec<u32>,
    lengths: Vec<u32>,
}

impl TarIndexTable {
    /// Byte range for a slot, or `None` when nothing was written there.
    pub fn lookup(&self, slot: usize) -> Option<(u64, u32)> {
        let length = *self.lengths.get(slot)?;
        if length == 0 {
            return None;
        }
        Some((u64::from(self.offsets[slot]), length))
    }

    /// Parse an index artifact. Records may arrive in any order;
    /// last-write-wins on duplicate slots. Malformed lines are logged and
    /// skipped, never surfaced as an error.
    pub fn parse(text: &str) -> Self {
        let slots = ITEMS_PER_SHARD as usize;
        let mut offsets = vec![0u32; slots];
        let mut lengths = vec![0u32; slots];
        let mut bad_lines = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_record(line) {
                Some((id, offset, length)) => {
                    let slot = (id % ITEMS_PER_SHARD) as usize;
                    offsets[slot] = offset;
                    lengths[slot] = length;
                }
                None => bad_lines += 1,
            }
        }

        if bad_lines > 0 {
            warn!("skipped {} malformed index line(s)", bad_lines);
        }
        Self { offsets, lengths }
    }
}

/// One `<name>\t<offset>\t<length>` record. The cover id is the leading
/// digit run of the name field, at most ten digits; a trailing filename
/// suffix such as `.jpg` is ignored.
fn parse_record(line: &str) -> Option<(i64, u32, u32)> {
    let mut fields = line.split('\t');
    let name = fields.next()?;
    let offset = fields.next()?.trim().parse::<u32>().ok()?;
    let length = fields.next()?.trim().parse::<u32>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    let digits = name.len() - name.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let id = name.get(..digits.min(10))?.parse::<i64>().ok()?;
    Some((id, offset, length))
}

type CacheKey = (i64, SizeClass);
type CacheSlot = Arc<OnceCell<Option<Arc<TarIndexTable>>>>;

/// Lazily populated, never-invalidated cache of shard index tables.
///
/// Each key is loaded at most once: the first reader pays the parse cost
/// while concurrent readers for the same key await the same cell. Readers
/// for different keys never contend beyond the map lookup.
pub struct TarIndexCache {
    data_root: PathBuf,
    entries: Mutex<HashMap<CacheKey, CacheSlot>>,
}

impl TarIndexCache {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Table for `(shard, size)`, or `None` when the index artifact does not
    /// exist or cannot be read. Absence means "cannot resolve locally", not
    /// an error: callers degrade to the metadata fallback.
    pub async fn get(&self, shard: i64, size: SizeClass) -> Option<Arc<TarIndexTable>> {
        let cell = {
            let mut entries = match self.entries.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            entries.entry((shard, size)).or_default().clone()
        };
        cell.get_or_init(|| self.load(shard, size)).await.clone()
    }

    async fn load(&self, shard: i64, size: SizeClass) -> Option<Arc<TarIndexTable>> {
        let path = self.data_root.join(shards::index_path(shard, size));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!("loaded shard index {}", path.display());
                Some(Arc::new(TarIndexTable::parse(&text)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!("failed to read shard index {}: {}", path.display(), err);
                None
            }
        }
    }
}
