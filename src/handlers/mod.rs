pub mod cover_handlers;
pub mod health_handlers;
