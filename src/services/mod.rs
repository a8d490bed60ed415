pub mod catalog;
pub mod metadata;
pub mod retriever;
pub mod router;
pub mod shards;
pub mod store;
pub mod tar_index;
