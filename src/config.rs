use crate::services::router::RoutingConfig;
use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Root directory holding `items/` (shard indexes + tar archives) and
    /// directly stored cover files.
    pub data_root: String,
    pub database_url: String,
    /// Placeholder image served when a cover cannot be found. Optional.
    pub default_image: Option<String>,
    /// Base URL of the remote archive download endpoint.
    pub archive_url: String,
    /// Base URL of the catalog used to resolve isbn/oclc/olid keys.
    pub catalog_url: String,
    /// Number of cluster items migrated to the remote object store. Ids below
    /// `items * 10_000` redirect there. Zero disables the cutover.
    pub cluster_items: i64,
    /// Ids below this may be resolved through local shard indexes.
    pub local_index_limit: i64,
    /// Legacy batched-tar id range, served by remote tar redirects.
    pub legacy_tar_start: i64,
    pub legacy_tar_end: i64,
    /// Cover ids that must never be served.
    pub blocked_ids: Vec<i64>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Book cover storage and retrieval API")]
pub struct Args {
    /// Host to bind to (overrides COVERSTORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides COVERSTORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root directory for shard indexes and cover files (overrides COVERSTORE_DATA_ROOT)
    #[arg(long)]
    pub data_root: Option<String>,

    /// Database URL (overrides COVERSTORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Placeholder image path (overrides COVERSTORE_DEFAULT_IMAGE)
    #[arg(long)]
    pub default_image: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("COVERSTORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("COVERSTORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing COVERSTORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8081,
            Err(err) => return Err(err).context("reading COVERSTORE_PORT"),
        };
        let env_data_root =
            env::var("COVERSTORE_DATA_ROOT").unwrap_or_else(|_| "./data/covers".into());
        let env_db = env::var("COVERSTORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/coverstore.db".into());
        let default_image = env::var("COVERSTORE_DEFAULT_IMAGE").ok();
        let archive_url = env::var("COVERSTORE_ARCHIVE_URL")
            .unwrap_or_else(|_| "https://archive.org/download".into());
        let catalog_url =
            env::var("COVERSTORE_CATALOG_URL").unwrap_or_else(|_| "https://openlibrary.org".into());

        let cluster_items = parse_i64_env("COVERSTORE_CLUSTER_ITEMS", 0)?;
        let local_index_limit = parse_i64_env("COVERSTORE_LOCAL_INDEX_LIMIT", 6_000_000)?;
        let legacy_tar_start = parse_i64_env("COVERSTORE_LEGACY_TAR_START", 8_000_000)?;
        let legacy_tar_end = parse_i64_env("COVERSTORE_LEGACY_TAR_END", 8_820_000)?;
        let blocked_ids = parse_id_list_env("COVERSTORE_BLOCKED_IDS")?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            data_root: args.data_root.unwrap_or(env_data_root),
            database_url: args.database_url.unwrap_or(env_db),
            default_image: args.default_image.or(default_image),
            archive_url,
            catalog_url,
            cluster_items,
            local_index_limit,
            legacy_tar_start,
            legacy_tar_end,
            blocked_ids,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Immutable routing thresholds handed to the tier router.
    pub fn routing(&self) -> RoutingConfig {
        RoutingConfig {
            blocked: self.blocked_ids.iter().copied().collect::<HashSet<_>>(),
            cluster_cutover: self.cluster_items.saturating_mul(10_000),
            local_index_limit: self.local_index_limit,
            legacy_tar_start: self.legacy_tar_start,
            legacy_tar_end: self.legacy_tar_end,
            archive_url: self.archive_url.clone(),
        }
    }
}

fn parse_i64_env(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(value) => value
            .parse::<i64>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

/// Comma-separated id list, e.g. `COVERSTORE_BLOCKED_IDS=101,202`.
fn parse_id_list_env(key: &str) -> Result<Vec<i64>> {
    match env::var(key) {
        Ok(value) => value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .with_context(|| format!("parsing {} entry `{}`", key, s))
            })
            .collect(),
        Err(env::VarError::NotPresent) => Ok(Vec::new()),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
