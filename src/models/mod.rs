//! Core data models for the cover storage service.
//!
//! These entities represent cover metadata rows and the size classes a
//! cover can be requested in. They map to database tables via
//! `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod cover;
pub mod size;
