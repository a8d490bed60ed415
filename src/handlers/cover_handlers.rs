//! HTTP handlers for cover retrieval and the small metadata endpoints.
//!
//! The cover path is the hot one: it translates the incoming key to a
//! numeric id, asks the tier router for a location, and either serves bytes,
//! redirects to a remote archive tier, or falls back to the placeholder.

use crate::{
    errors::AppError,
    models::size::SizeClass,
    services::{
        catalog::KeyKind,
        retriever::{self, CachePolicy, Retrieved},
        router::BlobLocation,
        store::CoverStore,
    },
};
use axum::{
    Form, Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;

/// `GET /` — short index page.
pub async fn index() -> Html<&'static str> {
    Html(
        "<h1>Book Covers Repository</h1>\
         <div>Covers are addressed as /{category}/{key}/{value}-{size}.jpg</div>",
    )
}

/// `GET /{category}/{key}/{value}` where value is `{key-value}[-S|M|L].jpg`
/// or `{key-value}.json`. One handler covers both shapes because they share
/// the key-to-id translation.
pub async fn get_cover(
    State(store): State<CoverStore>,
    Path((category, key, value)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(kind) = KeyKind::parse(&key.to_lowercase()) else {
        return Ok(notfound(&store, &params));
    };

    if let Some(stem) = value.strip_suffix(".json") {
        return cover_details(&store, &category, kind, stem).await;
    }
    let Some(stem) = value.strip_suffix(".jpg") else {
        return Ok(notfound(&store, &params));
    };
    let (stem, size) = split_size_suffix(stem);

    let Some(id) = resolve_id(&store, &category, kind, stem).await? else {
        return Ok(notfound(&store, &params));
    };

    let resolution = store.router.resolve(id, size).await?;
    if let BlobLocation::Redirect { url } = &resolution.location {
        return Ok(found(url));
    }

    match retriever::fetch(&resolution.location).await {
        Retrieved::Bytes(bytes) => {
            let last_modified = resolution
                .record
                .as_ref()
                .map(|r| r.last_modified)
                .unwrap_or_else(sealed_shard_mtime);

            let mut response_headers = HeaderMap::new();
            // Cache-forever semantics only when addressed by the immutable
            // numeric id; secondary keys may later map to a different cover.
            if kind == KeyKind::Id {
                let etag = retriever::etag_for(id, size);
                if retriever::not_modified(&request_headers, &etag, last_modified) {
                    return Ok(not_modified_response());
                }
                retriever::apply_cache_headers(
                    &mut response_headers,
                    CachePolicy::Immutable,
                    Some(&etag),
                    Some(last_modified),
                );
            } else {
                retriever::apply_cache_headers(
                    &mut response_headers,
                    CachePolicy::ShortLived,
                    None,
                    None,
                );
            }
            response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));

            let mut response = Response::new(Body::from(bytes));
            *response.headers_mut() = response_headers;
            Ok(response)
        }
        Retrieved::Redirect(url) => Ok(found(&url)),
        Retrieved::NotFound => Ok(notfound(&store, &params)),
    }
}

/// `.json` details: the metadata record for id-keyed lookups, a redirect to
/// the id-keyed URL for everything else.
async fn cover_details(
    store: &CoverStore,
    category: &str,
    kind: KeyKind,
    value: &str,
) -> Result<Response, AppError> {
    match resolve_id(store, category, kind, value).await? {
        Some(id) if kind == KeyKind::Id => match store.metadata.details(id).await? {
            Some(record) => Ok(Json(record).into_response()),
            None => Err(AppError::not_found(format!("no cover with id {}", id))),
        },
        Some(id) => Ok(found(&format!("/{}/id/{}.json", category, id))),
        None => Err(AppError::not_found("no matching cover")),
    }
}

/// Query params accepted by `GET /{category}/query`.
#[derive(Debug, Deserialize)]
pub struct CoverQuery {
    pub olid: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub details: Option<String>,
    pub cmd: Option<String>,
    pub callback: Option<String>,
}

const QUERY_LIMIT_CAP: i64 = 100;

/// `GET /{category}/query` — list covers by category and optional olid(s).
pub async fn query_covers(
    State(store): State<CoverStore>,
    Path(category): Path<String>,
    Query(q): Query<CoverQuery>,
) -> Result<Response, AppError> {
    let offset = parse_int(q.offset.as_deref()).unwrap_or(0).max(0);
    let limit = parse_int(q.limit.as_deref())
        .unwrap_or(10)
        .clamp(1, QUERY_LIMIT_CAP);
    let details = q.details.as_deref().is_some_and(|d| d.eq_ignore_ascii_case("true"));

    let olids: Vec<String> = q
        .olid
        .as_deref()
        .map(|olid| olid.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let records = store.metadata.query(&category, &olids, offset, limit).await?;

    let body: Value = if q.cmd.as_deref() == Some("ids") {
        let map: serde_json::Map<String, Value> = records
            .iter()
            .filter_map(|r| r.olid.clone().map(|olid| (olid, json!(r.id))))
            .collect();
        Value::Object(map)
    } else if details {
        Value::Array(
            records
                .iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "olid": r.olid,
                        "created": r.created.to_rfc3339(),
                        "last_modified": r.last_modified.to_rfc3339(),
                        "source_url": r.source_url,
                        "width": r.width,
                        "height": r.height,
                    })
                })
                .collect(),
        )
    } else {
        Value::Array(records.iter().map(|r| json!(r.id)).collect())
    };

    let text = match q.callback.as_deref() {
        Some(callback) => format!("{}({});", callback, body),
        None => body.to_string(),
    };
    let mut response = Response::new(Body::from(text));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/javascript"),
    );
    Ok(response)
}

/// Form body shared by the touch and delete endpoints.
#[derive(Debug, Deserialize)]
pub struct CoverActionForm {
    pub id: Option<String>,
    pub redirect_url: Option<String>,
}

/// `POST /{category}/touch` — bump last_modified so caches revalidate.
pub async fn touch_cover(
    State(store): State<CoverStore>,
    Path(_category): Path<String>,
    Form(form): Form<CoverActionForm>,
) -> Result<Response, AppError> {
    let Some(id) = form.id.as_deref().and_then(|id| id.parse::<i64>().ok()) else {
        return Ok(plain_text(format!("no such id: {:?}", form.id)));
    };
    store.metadata.touch(id).await?;
    Ok(match form.redirect_url.as_deref() {
        Some(url) => see_other(url),
        None => plain_text("ok".into()),
    })
}

/// `POST /{category}/delete` — soft-delete a cover by id.
pub async fn delete_cover(
    State(store): State<CoverStore>,
    Path(_category): Path<String>,
    Form(form): Form<CoverActionForm>,
) -> Result<Response, AppError> {
    let Some(id) = form.id.as_deref().and_then(|id| id.parse::<i64>().ok()) else {
        return Ok(plain_text(format!("no such id: {:?}", form.id)));
    };
    store.metadata.soft_delete(id).await?;
    Ok(match form.redirect_url.as_deref() {
        Some(url) => see_other(url),
        None => plain_text("cover has been deleted successfully.".into()),
    })
}

/// Translate the key to a numeric id, consulting the catalog for secondary
/// keys.
async fn resolve_id(
    store: &CoverStore,
    category: &str,
    kind: KeyKind,
    value: &str,
) -> Result<Option<i64>, AppError> {
    match kind {
        KeyKind::Id => Ok(value.parse::<i64>().ok().filter(|id| *id >= 0)),
        _ => Ok(store.catalog.resolve(category, kind, value.trim()).await?),
    }
}

/// Split the `-S|-M|-L` rendition suffix off a value stem.
fn split_size_suffix(stem: &str) -> (&str, SizeClass) {
    if let Some((head, letter)) = stem.rsplit_once('-') {
        if let Some(size) = SizeClass::from_suffix(letter).filter(|s| s.is_derived()) {
            return (head, size);
        }
    }
    (stem, SizeClass::Original)
}

/// Not-found contract: `?default=false` gives a plain 404, a URL-valued
/// `default` redirects there, otherwise the configured placeholder image is
/// served when present.
fn notfound(store: &CoverStore, params: &HashMap<String, String>) -> Response {
    let default = params.get("default").map(String::as_str).unwrap_or("true");
    if default.eq_ignore_ascii_case("false") {
        return StatusCode::NOT_FOUND.into_response();
    }
    if is_valid_url(default) {
        return found(default);
    }
    match &store.default_image {
        Some(bytes) => {
            let mut response = Response::new(Body::from(bytes.clone()));
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
            response
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn parse_int(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

fn is_valid_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Timestamp used as the validator for covers served straight from sealed
/// shard archives, which predate per-cover modification tracking.
fn sealed_shard_mtime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap()
}

fn found(url: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(url) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

fn see_other(url: &str) -> Response {
    let mut response = StatusCode::SEE_OTHER.into_response();
    if let Ok(value) = HeaderValue::from_str(url) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

fn not_modified_response() -> Response {
    StatusCode::NOT_MODIFIED.into_response()
}

fn plain_text(text: String) -> Response {
    let mut response = Response::new(Body::from(text));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
