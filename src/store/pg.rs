//! `_sys_*` tables in a dedicated schema (from `APPGEN_SCHEMA`, default `appgen`).

use super::{Persistence, StoreError};
use crate::case::is_identifier;
use crate::catalog::{CatalogState, StoredApplication};
use crate::definition::types::ApplicationDraft;
use crate::emit::ArtifactId;
use crate::regen::ArtifactIndex;
use crate::resolve::KnownApplication;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

const APPLICATIONS_TABLE: &str = "_sys_applications";
const APPLICATIONS_HISTORY_TABLE: &str = "_sys_applications_history";
const ARTIFACT_INDEX_TABLE: &str = "_sys_artifact_index";
const KNOWN_TABLE: &str = "_sys_known_applications";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    /// Create the schema and `_sys_*` tables if missing.
    pub async fn connect(pool: PgPool, schema: &str) -> Result<Self, StoreError> {
        if !is_identifier(schema) {
            return Err(StoreError::InvalidSchema(schema.to_string()));
        }
        let store = PgStore {
            pool,
            schema: schema.to_string(),
        };
        store.ensure_sys_tables().await?;
        Ok(store)
    }

    /// Schema-qualified table name, e.g. `appgen._sys_applications`.
    fn table(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    async fn ensure_sys_tables(&self) -> Result<(), StoreError> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
            .execute(&self.pool)
            .await?;

        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                payload JSONB NOT NULL,
                version BIGINT NOT NULL DEFAULT 1,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            )
            "#,
            self.table(APPLICATIONS_TABLE)
        );
        sqlx::query(&ddl).execute(&self.pool).await?;

        let history_ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT NOT NULL,
                payload JSONB NOT NULL,
                version BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (id, version)
            )
            "#,
            self.table(APPLICATIONS_HISTORY_TABLE)
        );
        sqlx::query(&history_ddl).execute(&self.pool).await?;

        let index_ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                application TEXT NOT NULL,
                artifact_key TEXT NOT NULL,
                artifact JSONB NOT NULL,
                path TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (application, artifact_key)
            )
            "#,
            self.table(ARTIFACT_INDEX_TABLE)
        );
        sqlx::query(&index_ddl).execute(&self.pool).await?;

        let known_ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                payload JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table(KNOWN_TABLE)
        );
        sqlx::query(&known_ddl).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for PgStore {
    async fn load(&self) -> Result<CatalogState, StoreError> {
        let mut state = CatalogState::default();

        let rows: Vec<(String, serde_json::Value, i64, DateTime<Utc>)> = sqlx::query_as(&format!(
            "SELECT id, payload, version, updated_at FROM {} WHERE deleted_at IS NULL ORDER BY id",
            self.table(APPLICATIONS_TABLE)
        ))
        .fetch_all(&self.pool)
        .await?;
        for (name, payload, version, updated_at) in rows {
            let draft: ApplicationDraft = serde_json::from_value(payload)?;
            state.applications.insert(
                name.clone(),
                StoredApplication {
                    name,
                    draft,
                    version,
                    updated_at,
                },
            );
        }

        let rows: Vec<(String, serde_json::Value)> =
            sqlx::query_as(&format!("SELECT id, payload FROM {} ORDER BY id", self.table(KNOWN_TABLE)))
                .fetch_all(&self.pool)
                .await?;
        for (name, payload) in rows {
            match serde_json::from_value::<KnownApplication>(payload)?.models {
                Some(models) => state.known.insert_generated(name, models),
                None => state.known.insert_opaque(name),
            }
        }

        let rows: Vec<(serde_json::Value, String, String)> = sqlx::query_as(&format!(
            "SELECT artifact, path, fingerprint FROM {}",
            self.table(ARTIFACT_INDEX_TABLE)
        ))
        .fetch_all(&self.pool)
        .await?;
        for (artifact, path, fingerprint) in rows {
            let id: ArtifactId = serde_json::from_value(artifact)?;
            state.index.insert(id, path, fingerprint);
        }

        tracing::info!(
            applications = state.applications.len(),
            indexed_artifacts = state.index.len(),
            "catalog loaded from database"
        );
        Ok(state)
    }

    /// Copies the current row to history, then upserts the new payload.
    async fn save_application(&self, application: &StoredApplication) -> Result<(), StoreError> {
        let q_table = self.table(APPLICATIONS_TABLE);
        let payload = serde_json::to_value(&application.draft)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, payload, version, created_at) SELECT id, payload, version, updated_at FROM {} WHERE id = $1 ON CONFLICT DO NOTHING",
            self.table(APPLICATIONS_HISTORY_TABLE),
            q_table
        ))
        .bind(&application.name)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, payload, version, updated_at, deleted_at) VALUES ($1, $2, $3, $4, NULL)
            ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload, version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at, deleted_at = NULL
            "#,
            q_table
        ))
        .bind(&application.name)
        .bind(payload)
        .bind(application.version)
        .bind(application.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_application(&self, name: &str) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "UPDATE {} SET deleted_at = NOW() WHERE id = $1",
            self.table(APPLICATIONS_TABLE)
        ))
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_index(&self, application: &str, index: &ArtifactIndex) -> Result<(), StoreError> {
        let q_table = self.table(ARTIFACT_INDEX_TABLE);
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {} WHERE application = $1", q_table))
            .bind(application)
            .execute(&mut *tx)
            .await?;
        for (id, entry) in index.iter().filter(|(id, _)| id.application == application) {
            sqlx::query(&format!(
                "INSERT INTO {} (application, artifact_key, artifact, path, fingerprint, updated_at) VALUES ($1, $2, $3, $4, $5, NOW())",
                q_table
            ))
            .bind(application)
            .bind(id.to_string())
            .bind(serde_json::to_value(id)?)
            .bind(&entry.path)
            .bind(&entry.fingerprint)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_known(&self, name: &str, entry: &KnownApplication) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, payload, updated_at) VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()
            "#,
            self.table(KNOWN_TABLE)
        ))
        .bind(name)
        .bind(serde_json::to_value(entry)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn forget_known(&self, name: &str) -> Result<(), StoreError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table(KNOWN_TABLE)))
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::InvalidUrl("no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
