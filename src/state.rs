//! Shared application state for all routes.

use crate::service::GenerationService;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    /// Present when the catalog is persisted in PostgreSQL; checked by `/ready`.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(service: Arc<GenerationService>, pool: Option<PgPool>) -> Self {
        AppState { service, pool }
    }
}
