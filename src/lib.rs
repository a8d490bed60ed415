//! Cover image storage and retrieval service.
//!
//! Maps numeric cover ids to image bytes stored either in sealed per-shard
//! tar archives on local disk or in remote archive items, and serves them
//! over HTTP with caching semantics that depend on how the cover was
//! addressed.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
