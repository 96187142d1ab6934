//! Persistence of the catalog: stored applications, known applications and the artifact index.
//!
//! Two backends: PostgreSQL `_sys_*` tables ([`PgStore`]) and JSON files under
//! `<output>/.appgen/` ([`FileStore`]). The service only sees [`Persistence`].

mod file;
mod pg;

pub use file::FileStore;
pub use pg::{ensure_database_exists, PgStore};

use crate::catalog::{CatalogState, StoredApplication};
use crate::regen::ArtifactIndex;
use crate::resolve::KnownApplication;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid DATABASE_URL: {0}")]
    InvalidUrl(String),
    #[error("invalid schema name: {0}")]
    InvalidSchema(String),
}

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Everything recorded so far; logically deleted applications are left out.
    async fn load(&self) -> Result<CatalogState, StoreError>;

    async fn save_application(&self, application: &StoredApplication) -> Result<(), StoreError>;

    /// Logical delete. Emitted artifacts and their index entries are kept.
    async fn delete_application(&self, name: &str) -> Result<(), StoreError>;

    /// Replace the index entries of one application.
    async fn save_index(&self, application: &str, index: &ArtifactIndex) -> Result<(), StoreError>;

    /// Record one application in the known-applications index; other entries are untouched.
    async fn save_known(&self, name: &str, entry: &KnownApplication) -> Result<(), StoreError>;

    /// Drop one application from the known-applications index.
    async fn forget_known(&self, name: &str) -> Result<(), StoreError>;
}
