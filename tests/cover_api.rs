//! End-to-end tests for the cover retrieval API, driven through the router.

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use chrono::Utc;
use coverstore::routes::routes::routes;
use coverstore::services::catalog::{Catalog, CatalogError, KeyKind};
use coverstore::services::router::RoutingConfig;
use coverstore::services::store::CoverStore;
use axum::http::{HeaderValue, StatusCode, header};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Catalog stub resolving every secondary key to one fixed id.
struct StubCatalog {
    id: Option<i64>,
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn resolve(
        &self,
        _category: &str,
        kind: KeyKind,
        value: &str,
    ) -> Result<Option<i64>, CatalogError> {
        match kind {
            KeyKind::Id => Ok(value.parse().ok()),
            _ => Ok(self.id),
        }
    }
}

struct Harness {
    server: TestServer,
    pool: Arc<SqlitePool>,
    #[allow(dead_code)]
    data_root: TempDir,
}

struct HarnessOptions {
    cluster_items: i64,
    blocked: Vec<i64>,
    default_image: Option<Bytes>,
    catalog_id: Option<i64>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            cluster_items: 0,
            blocked: Vec::new(),
            default_image: None,
            catalog_id: None,
        }
    }
}

async fn harness(options: HarnessOptions) -> Harness {
    let data_root = TempDir::new().unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for stmt in include_str!("../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    let pool = Arc::new(pool);

    let routing = RoutingConfig {
        blocked: options.blocked.into_iter().collect::<HashSet<_>>(),
        cluster_cutover: options.cluster_items * 10_000,
        local_index_limit: 6_000_000,
        legacy_tar_start: 8_000_000,
        legacy_tar_end: 8_820_000,
        archive_url: "https://archive.org/download".into(),
    };
    let store = CoverStore::new(
        pool.clone(),
        data_root.path(),
        routing,
        Arc::new(StubCatalog {
            id: options.catalog_id,
        }),
        options.default_image,
    );
    let server = TestServer::new(routes().with_state(store)).unwrap();
    Harness {
        server,
        pool,
        data_root,
    }
}

/// Shard fixture: index record for id 12345 / medium plus the matching tar
/// archive with the payload at the recorded offset.
fn write_medium_shard(data_root: &Path, payload: &[u8]) {
    let item_dir = data_root.join("items/m_covers_0000");
    fs::create_dir_all(&item_dir).unwrap();
    fs::write(
        item_dir.join("m_covers_0000_01.index"),
        format!("0000012345.jpg\t5000\t{}\n", payload.len()),
    )
    .unwrap();
    let mut archive = vec![0u8; 5000];
    archive.extend_from_slice(payload);
    archive.extend_from_slice(&[0u8; 64]);
    fs::write(item_dir.join("m_covers_0000_01.tar"), archive).unwrap();
}

async fn insert_cover(pool: &SqlitePool, id: i64, olid: &str, filename: &str, uploaded: bool) {
    sqlx::query(
        "INSERT INTO covers (id, category, olid, filename, width, height, uploaded, deleted, created, last_modified)
         VALUES (?, 'b', ?, ?, 300, 400, ?, 0, ?, ?)",
    )
    .bind(id)
    .bind(olid)
    .bind(filename)
    .bind(uploaded)
    .bind(Utc::now())
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn shard_hit_serves_bytes_with_immutable_caching() {
    let h = harness(HarnessOptions::default()).await;
    write_medium_shard(h.data_root.path(), b"jpeg payload");

    let response = h.server.get("/b/id/12345-M.jpg").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.as_bytes().as_ref(), &b"jpeg payload"[..]);

    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "public");
    assert_eq!(headers.get(header::ETAG).unwrap(), "\"12345-m\"");
    assert!(headers.contains_key(header::EXPIRES));
    assert!(headers.contains_key(header::LAST_MODIFIED));
}

#[tokio::test]
async fn matching_validator_returns_not_modified() {
    let h = harness(HarnessOptions::default()).await;
    write_medium_shard(h.data_root.path(), b"jpeg payload");

    let response = h
        .server
        .get("/b/id/12345-M.jpg")
        .add_header(
            header::IF_NONE_MATCH,
            HeaderValue::from_static("\"12345-m\""),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_MODIFIED);
    assert!(response.as_bytes().is_empty());
}

#[tokio::test]
async fn legacy_tar_range_redirects_to_remote_archive() {
    let h = harness(HarnessOptions::default()).await;

    let response = h.server.get("/b/id/8500000.jpg").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://archive.org/download/covers_8500/covers_8500_00.tar/0008500000.jpg"
    );
}

#[tokio::test]
async fn cluster_cutover_redirects_when_enabled() {
    let h = harness(HarnessOptions {
        cluster_items: 10,
        ..HarnessOptions::default()
    })
    .await;
    write_medium_shard(h.data_root.path(), b"must not be served");

    let response = h.server.get("/b/id/12345-M.jpg").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://archive.org/download/olcovers1/olcovers1-M.zip/12345-M.jpg"
    );
}

#[tokio::test]
async fn never_issued_id_is_not_found() {
    let h = harness(HarnessOptions::default()).await;

    let response = h
        .server
        .get("/b/id/999999999.jpg")
        .add_query_param("default", "false")
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn placeholder_served_when_configured() {
    let h = harness(HarnessOptions {
        default_image: Some(Bytes::from_static(b"placeholder jpeg")),
        ..HarnessOptions::default()
    })
    .await;

    let response = h.server.get("/b/id/999999999.jpg").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.as_bytes().as_ref(), &b"placeholder jpeg"[..]);
}

#[tokio::test]
async fn miss_redirects_to_url_valued_default() {
    let h = harness(HarnessOptions::default()).await;

    let response = h
        .server
        .get("/b/id/999999999.jpg")
        .add_query_param("default", "https://example.org/missing.jpg")
        .await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.org/missing.jpg"
    );
}

#[tokio::test]
async fn blocked_id_is_indistinguishable_from_missing() {
    let h = harness(HarnessOptions {
        blocked: vec![12_345],
        ..HarnessOptions::default()
    })
    .await;
    // Even with the bytes present locally.
    write_medium_shard(h.data_root.path(), b"jpeg payload");

    let blocked = h
        .server
        .get("/b/id/12345-M.jpg")
        .add_query_param("default", "false")
        .await;
    let missing = h
        .server
        .get("/b/id/999999999.jpg")
        .add_query_param("default", "false")
        .await;
    assert_eq!(blocked.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(blocked.status_code(), missing.status_code());
    assert_eq!(blocked.as_bytes(), missing.as_bytes());
}

#[tokio::test]
async fn secondary_key_gets_short_lived_caching() {
    let h = harness(HarnessOptions {
        catalog_id: Some(12_345),
        ..HarnessOptions::default()
    })
    .await;
    write_medium_shard(h.data_root.path(), b"jpeg payload");

    let response = h.server.get("/b/isbn/0385472579-M.jpg").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.as_bytes().as_ref(), &b"jpeg payload"[..]);

    let headers = response.headers();
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "public");
    // The isbn-to-id mapping can change, so no immutable validators.
    assert!(!headers.contains_key(header::ETAG));
}

#[tokio::test]
async fn migrated_cover_redirects_by_its_record() {
    let h = harness(HarnessOptions::default()).await;
    insert_cover(&h.pool, 9_000_000, "OL1M", "olcovers900.zip", true).await;

    let response = h.server.get("/b/id/9000000.jpg").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://archive.org/download/olcovers900/olcovers900.zip/9000000.jpg"
    );
}

#[tokio::test]
async fn details_json_by_id_and_by_secondary_key() {
    let h = harness(HarnessOptions {
        catalog_id: Some(7_000_123),
        ..HarnessOptions::default()
    })
    .await;
    insert_cover(&h.pool, 7_000_123, "OL7000123M", "covers/0007000123.jpg", false).await;

    let by_id = h.server.get("/b/id/7000123.json").await;
    assert_eq!(by_id.status_code(), StatusCode::OK);
    let body: serde_json::Value = by_id.json();
    assert_eq!(body["id"], 7_000_123);
    assert_eq!(body["olid"], "OL7000123M");
    assert_eq!(body["width"], 300);

    let by_olid = h.server.get("/b/olid/OL7000123M.json").await;
    assert_eq!(by_olid.status_code(), StatusCode::FOUND);
    assert_eq!(
        by_olid.headers().get(header::LOCATION).unwrap(),
        "/b/id/7000123.json"
    );
}

#[tokio::test]
async fn query_lists_filters_and_clamps() {
    let h = harness(HarnessOptions::default()).await;
    insert_cover(&h.pool, 1, "OL1M", "covers/1.jpg", false).await;
    insert_cover(&h.pool, 2, "OL2M", "covers/2.jpg", false).await;

    let ids = h.server.get("/b/query").await;
    assert_eq!(ids.status_code(), StatusCode::OK);
    let ids: serde_json::Value = ids.json();
    assert_eq!(ids.as_array().unwrap().len(), 2);

    let filtered = h
        .server
        .get("/b/query")
        .add_query_param("olid", "OL2M")
        .add_query_param("cmd", "ids")
        .await;
    let map: serde_json::Value = filtered.json();
    assert_eq!(map["OL2M"], 2);

    let detailed = h
        .server
        .get("/b/query")
        .add_query_param("olid", "OL1M")
        .add_query_param("details", "true")
        .add_query_param("limit", "100000")
        .await;
    let rows: serde_json::Value = detailed.json();
    let row = &rows.as_array().unwrap()[0];
    assert_eq!(row["id"], 1);
    assert!(row["created"].is_string());
}

#[tokio::test]
async fn touch_and_soft_delete() {
    let h = harness(HarnessOptions::default()).await;
    insert_cover(&h.pool, 42, "OL42M", "covers/42.jpg", false).await;

    let touched = h.server.post("/b/touch").form(&[("id", "42")]).await;
    assert_eq!(touched.status_code(), StatusCode::OK);

    let deleted = h.server.post("/b/delete").form(&[("id", "42")]).await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    assert_eq!(deleted.text(), "cover has been deleted successfully.");

    // The row stays but retrieval now treats the cover as absent.
    let details = h.server.get("/b/id/42.json").await;
    assert_eq!(details.status_code(), StatusCode::NOT_FOUND);
    let cover = h
        .server
        .get("/b/id/42.jpg")
        .add_query_param("default", "false")
        .await;
    assert_eq!(cover.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metadata_outage_is_service_unavailable_not_missing() {
    let h = harness(HarnessOptions::default()).await;
    insert_cover(&h.pool, 123, "OL123M", "covers/123.jpg", false).await;
    h.pool.close().await;

    // An unreachable metadata store must read as retryable, never as 404.
    let cover = h.server.get("/b/id/123.jpg").await;
    assert_eq!(cover.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    let details = h.server.get("/b/id/123.json").await;
    assert_eq!(details.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn responses_allow_cross_origin_embedding() {
    let h = harness(HarnessOptions::default()).await;
    write_medium_shard(h.data_root.path(), b"jpeg payload");

    let response = h
        .server
        .get("/b/id/12345-M.jpg")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("https://example.org"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn health_endpoints_respond() {
    let h = harness(HarnessOptions::default()).await;

    let live = h.server.get("/healthz").await;
    assert_eq!(live.status_code(), StatusCode::OK);

    let ready = h.server.get("/readyz").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    let body: serde_json::Value = ready.json();
    assert_eq!(body["status"], "ok");
}
