//! Metadata row for a stored cover.

use crate::models::size::SizeClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One cover as recorded by the metadata store.
///
/// The retrieval core never mutates this; it reads `created`/`last_modified`
/// for cache validators and `uploaded` plus the filename suffix to decide
/// whether the cover has been migrated to the remote archive tier.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct CoverRecord {
    /// Numeric cover id, assigned at ingestion time, immutable.
    pub id: i64,

    /// Category the cover was filed under (`b` books, `a` authors, `w` works).
    pub category: String,

    /// Catalog key the cover belongs to, when known.
    pub olid: Option<String>,

    /// Stored path of the original file, relative to the data root. May be
    /// a `path.tar:offset:length` triple for batch-archived covers, or a
    /// `.zip` member name once migrated to the remote archive.
    pub filename: Option<String>,

    /// Stored paths of the derived renditions.
    pub filename_s: Option<String>,
    pub filename_m: Option<String>,
    pub filename_l: Option<String>,

    /// Where the image was originally fetched from, if it was.
    pub source_url: Option<String>,

    pub width: Option<i64>,
    pub height: Option<i64>,

    /// Uploader address, kept for audit.
    pub ip: Option<String>,

    /// Set once the cover has been shipped to the remote archive tier.
    pub uploaded: bool,

    /// Soft-delete marker.
    pub deleted: bool,

    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl CoverRecord {
    /// Stored path for the requested rendition.
    pub fn filename_for(&self, size: SizeClass) -> Option<&str> {
        let name = match size {
            SizeClass::Small => &self.filename_s,
            SizeClass::Medium => &self.filename_m,
            SizeClass::Large => &self.filename_l,
            SizeClass::Original => &self.filename,
        };
        name.as_deref()
    }

    /// True when the original bytes live in a remote archive zip.
    pub fn migrated_to_remote(&self) -> bool {
        self.uploaded
            && self
                .filename
                .as_deref()
                .is_some_and(|name| name.contains(".zip"))
    }
}
