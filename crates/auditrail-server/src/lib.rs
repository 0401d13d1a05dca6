//! # auditrail-server
//!
//! HTTP service that records and queries audit events over a configurable
//! storage backend.

pub mod backend;
pub mod config;
pub mod error;
pub mod routes;

pub use backend::build_storage;
pub use config::{load_config, AppConfig, ServerConfig, StorageConfig};
pub use error::ApiError;
pub use routes::{create_router, AppState};
