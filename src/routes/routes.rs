//! Defines routes for cover retrieval and metadata operations.
//!
//! ## Structure
//! - **Cover endpoints**
//!   - `GET /{category}/{key}/{value}` — the cover path; `value` is
//!     `{key-value}[-S|M|L].jpg` for bytes/redirects or `{key-value}.json`
//!     for details. `key` is one of `id`, `isbn`, `oclc`, `olid`.
//!
//! - **Metadata endpoints**
//!   - `GET  /{category}/query`  — list covers by category/olid
//!   - `POST /{category}/touch`  — bump a cover's last_modified
//!   - `POST /{category}/delete` — soft-delete a cover
//!
//! Categories are `b` (books), `a` (authors), and `w` (works).

use crate::{
    handlers::{
        cover_handlers::{delete_cover, get_cover, index, query_covers, touch_cover},
        health_handlers::{healthz, readyz},
    },
    services::store::CoverStore,
};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

/// Build and return the router for all cover routes.
///
/// The router carries shared state (`CoverStore`) to all handlers.
pub fn routes() -> Router<CoverStore> {
    Router::new()
        .route("/", get(index))
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Metadata endpoints
        .route("/{category}/query", get(query_covers))
        .route("/{category}/touch", post(touch_cover))
        .route("/{category}/delete", post(delete_cover))
        // The cover path
        .route("/{category}/{key}/{value}", get(get_cover))
        // Covers are embedded cross-origin all over the web.
        .layer(CorsLayer::permissive())
}
