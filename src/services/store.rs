//! Shared application state wiring the retrieval core together.

use crate::services::catalog::Catalog;
use crate::services::metadata::MetadataGateway;
use crate::services::router::{RoutingConfig, TierRouter};
use bytes::Bytes;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the handlers need: the tier router, the metadata and catalog
/// collaborators, and the configured placeholder image.
#[derive(Clone)]
pub struct CoverStore {
    pub db: Arc<SqlitePool>,
    pub data_root: PathBuf,
    pub metadata: MetadataGateway,
    pub catalog: Arc<dyn Catalog>,
    pub router: Arc<TierRouter>,
    /// Served instead of a 404 when configured and the default is wanted.
    pub default_image: Option<Bytes>,
}

impl CoverStore {
    pub fn new(
        db: Arc<SqlitePool>,
        data_root: impl Into<PathBuf>,
        routing: RoutingConfig,
        catalog: Arc<dyn Catalog>,
        default_image: Option<Bytes>,
    ) -> Self {
        let data_root = data_root.into();
        let metadata = MetadataGateway::new(db.clone());
        let router = Arc::new(TierRouter::new(routing, &data_root, metadata.clone()));
        Self {
            db,
            data_root,
            metadata,
            catalog,
            router,
            default_image,
        }
    }
}
