//! Lookup-by-id access to the cover metadata store.

use crate::models::cover::CoverRecord;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

const RECORD_COLUMNS: &str = "id, category, olid, filename, filename_s, filename_m, filename_l, \
     source_url, width, height, ip, uploaded, deleted, created, last_modified";

/// SQLite-backed metadata gateway.
///
/// The retrieval core treats this as an external collaborator: a record
/// lookup by id, a `touch` to bump `last_modified`, and a soft delete.
#[derive(Clone)]
pub struct MetadataGateway {
    db: Arc<SqlitePool>,
}

impl MetadataGateway {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Record for `id`, excluding soft-deleted rows.
    pub async fn details(&self, id: i64) -> MetadataResult<Option<CoverRecord>> {
        let sql = format!("SELECT {} FROM covers WHERE id = ? AND deleted = 0", RECORD_COLUMNS);
        let record = sqlx::query_as::<_, CoverRecord>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(record)
    }

    /// Bump `last_modified` so downstream caches revalidate. Returns false
    /// when no such cover exists.
    pub async fn touch(&self, id: i64) -> MetadataResult<bool> {
        let result = sqlx::query("UPDATE covers SET last_modified = ? WHERE id = ? AND deleted = 0")
            .bind(Utc::now())
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a cover deleted. The row is kept; retrieval treats it as absent.
    pub async fn soft_delete(&self, id: i64) -> MetadataResult<bool> {
        let result = sqlx::query("UPDATE covers SET deleted = 1, last_modified = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Covers for a category, optionally filtered by olid, newest first.
    pub async fn query(
        &self,
        category: &str,
        olids: &[String],
        offset: i64,
        limit: i64,
    ) -> MetadataResult<Vec<CoverRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM covers WHERE deleted = 0 AND category = ",
            RECORD_COLUMNS
        ));
        builder.push_bind(category);

        if !olids.is_empty() {
            builder.push(" AND olid IN (");
            let mut separated = builder.separated(", ");
            for olid in olids {
                separated.push_bind(olid);
            }
            builder.push(")");
        }

        builder.push(" ORDER BY last_modified DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows)
    }
}
