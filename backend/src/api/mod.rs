//! API module - HTTP handlers and middleware.

pub mod download_response;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::storage::StorageBackend;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: PgPool,
    pub storage: Arc<dyn StorageBackend>,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: PgPool, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            config,
            db,
            storage,
        }
    }
}

pub type SharedState = Arc<AppState>;
