//! Resolution of logical cover keys (isbn, oclc, olid) to numeric cover ids
//! through the catalog's JSON API.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Kind of key carried by an incoming cover request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Id,
    Isbn,
    Oclc,
    Olid,
}

impl KeyKind {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "id" => Some(KeyKind::Id),
            "isbn" => Some(KeyKind::Isbn),
            "oclc" => Some(KeyKind::Oclc),
            "olid" => Some(KeyKind::Olid),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Http(#[from] reqwest::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Translates a logical key into a cover id before it reaches the
/// retrieval core. Implemented over HTTP in production and stubbed in tests.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn resolve(&self, category: &str, kind: KeyKind, value: &str)
    -> CatalogResult<Option<i64>>;
}

/// Catalog client backed by the Open Library JSON API.
pub struct OpenLibraryCatalog {
    http: reqwest::Client,
    base_url: String,
}

impl OpenLibraryCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// First usable cover id on a catalog document. Authors carry their
    /// images under `photos`, everything else under `covers`. A leading
    /// `null` or `-1` entry means "no cover".
    async fn cover_of_doc(&self, olkey: &str) -> CatalogResult<Option<i64>> {
        let url = format!("{}{}.json", self.base_url, olkey);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            debug!("catalog returned {} for {}", response.status(), olkey);
            return Ok(None);
        }
        let doc: Value = response.json().await?;
        let field = if olkey.starts_with("/authors") {
            "photos"
        } else {
            "covers"
        };
        let id = doc
            .get(field)
            .and_then(Value::as_array)
            .and_then(|covers| covers.first())
            .and_then(Value::as_i64)
            .filter(|id| *id >= 0);
        Ok(id)
    }

    /// Catalog keys of editions matching `field=value`.
    async fn edition_keys(&self, field: &str, value: &str) -> CatalogResult<Vec<String>> {
        let url = format!(
            "{}/query.json?type=/type/edition&{}={}&limit=10",
            self.base_url, field, value
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            debug!("catalog query returned {} for {}={}", response.status(), field, value);
            return Ok(Vec::new());
        }
        let docs: Value = response.json().await?;
        let keys = docs
            .as_array()
            .map(|docs| {
                docs.iter()
                    .filter_map(|doc| doc.get("key").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(keys)
    }
}

#[async_trait]
impl Catalog for OpenLibraryCatalog {
    async fn resolve(
        &self,
        category: &str,
        kind: KeyKind,
        value: &str,
    ) -> CatalogResult<Option<i64>> {
        match kind {
            KeyKind::Id => Ok(value.parse::<i64>().ok()),
            KeyKind::Olid => {
                let prefix = match category {
                    "a" => "/authors/",
                    "b" => "/books/",
                    "w" => "/works/",
                    _ => return Ok(None),
                };
                self.cover_of_doc(&format!("{}{}", prefix, value)).await
            }
            KeyKind::Isbn | KeyKind::Oclc => {
                // Editions are the only category indexed by these keys.
                if category != "b" {
                    return Ok(None);
                }
                let (field, value) = match kind {
                    KeyKind::Isbn => ("isbn_", value.replace('-', "")),
                    _ => ("oclc_numbers", value.trim().to_string()),
                };
                for key in self.edition_keys(field, value.trim()).await? {
                    if let Some(id) = self.cover_of_doc(&key).await? {
                        return Ok(Some(id));
                    }
                }
                Ok(None)
            }
        }
    }
}
