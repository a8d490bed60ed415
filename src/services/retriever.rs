//! Reads resolved blob locations and owns the HTTP caching decisions.
//!
//! Local I/O failures degrade to `NotFound`: a stale index may point at an
//! archive the cover has since been migrated out of, and the caller falls
//! back to the placeholder image rather than surfacing an error.

use crate::models::size::SizeClass;
use crate::services::router::BlobLocation;
use axum::http::{HeaderMap, HeaderValue, header};
use bytes::Bytes;
use chrono::{DateTime, Duration, Timelike, Utc};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// What the retriever produced for a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved {
    Bytes(Bytes),
    /// Remote locations are never read here; the bytes live in a separately
    /// served archive reachable by its own URL.
    Redirect(String),
    NotFound,
}

pub async fn fetch(location: &BlobLocation) -> Retrieved {
    match location {
        BlobLocation::LocalShard {
            archive,
            offset,
            length,
        } => match read_range(archive, *offset, *length).await {
            Ok(bytes) => Retrieved::Bytes(bytes),
            Err(err) => {
                debug!("shard read {} failed: {}", archive.display(), err);
                Retrieved::NotFound
            }
        },
        BlobLocation::LocalFile { path } => match tokio::fs::read(path).await {
            Ok(bytes) => Retrieved::Bytes(Bytes::from(bytes)),
            Err(err) => {
                debug!("file read {} failed: {}", path.display(), err);
                Retrieved::NotFound
            }
        },
        BlobLocation::Redirect { url } => Retrieved::Redirect(url.clone()),
        BlobLocation::Blocked | BlobLocation::NotFound => Retrieved::NotFound,
    }
}

/// Exactly `length` bytes at `offset` of a sealed archive. Short reads are
/// reported as errors and degrade to not-found upstream.
async fn read_range(path: &std::path::Path, offset: u64, length: u32) -> std::io::Result<Bytes> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

/// How long a response may be cached. A function of how the cover was
/// addressed, not of its content: numeric ids are immutable once assigned,
/// while a secondary key may later map to a different id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Addressed by id: the bytes never change, cache effectively forever.
    Immutable,
    /// Addressed by a mutable key: the mapping may move, cache briefly.
    ShortLived,
}

const SHORT_CACHE_MINUTES: i64 = 10;
const FOREVER_DAYS: i64 = 100 * 365;

/// Opaque validator for conditional GETs: `"{id}-{size letter}"`.
pub fn etag_for(id: i64, size: SizeClass) -> String {
    format!("\"{}-{}\"", id, size.letter())
}

/// True when the request's validators match, so an empty 304 is due.
/// Sub-second precision is dropped from the stored timestamp because HTTP
/// dates carry whole seconds.
pub fn not_modified(
    request: &HeaderMap,
    etag: &str,
    last_modified: DateTime<Utc>,
) -> bool {
    // If-None-Match takes precedence over If-Modified-Since when present.
    if let Some(inm) = request.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        return inm.split(',').any(|candidate| candidate.trim() == etag);
    }
    if let Some(ims) = request
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
    {
        return trim_subsecond(last_modified) <= ims.with_timezone(&Utc);
    }
    false
}

/// Cache-control, expiry, and validator headers for a cover response.
pub fn apply_cache_headers(
    headers: &mut HeaderMap,
    policy: CachePolicy,
    etag: Option<&str>,
    last_modified: Option<DateTime<Utc>>,
) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("public"));
    let ttl = match policy {
        CachePolicy::Immutable => Duration::days(FOREVER_DAYS),
        CachePolicy::ShortLived => Duration::minutes(SHORT_CACHE_MINUTES),
    };
    if let Ok(value) = HeaderValue::from_str(&(Utc::now() + ttl).to_rfc2822()) {
        headers.insert(header::EXPIRES, value);
    }
    if let Some(etag) = etag {
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(header::ETAG, value);
        }
    }
    if let Some(when) = last_modified {
        if let Ok(value) = HeaderValue::from_str(&trim_subsecond(when).to_rfc2822()) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

fn trim_subsecond(when: DateTime<Utc>) -> DateTime<Utc> {
    when.with_nanosecond(0).unwrap_or(when)
}
