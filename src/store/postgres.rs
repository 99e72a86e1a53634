//! Postgres datastore
//!
//! Uniqueness is enforced by the schema (fingerprint, reference), which is
//! what turns creation races into `Conflict` instead of duplicate rows.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::model::{Endpoint, IngestedRequest, User};

use super::{map_fetch_error, map_insert_error, Datastore, StoreError};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        fingerprint TEXT NOT NULL UNIQUE,
        banned BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS endpoints (
        id UUID PRIMARY KEY,
        reference TEXT NOT NULL UNIQUE,
        owner_id UUID NOT NULL REFERENCES users (id),
        active BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS ingested_requests (
        id UUID PRIMARY KEY,
        endpoint_id UUID NOT NULL REFERENCES endpoints (id),
        body TEXT NOT NULL,
        query TEXT NOT NULL,
        headers JSONB NOT NULL,
        source_ip TEXT,
        size BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS idx_endpoints_owner_created
        ON endpoints (owner_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_ingested_requests_created
        ON ingested_requests (created_at)",
];

/// Datastore backed by a Postgres connection pool.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the given DSN and ensure the schema exists.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(dsn).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        fingerprint: row.try_get("fingerprint")?,
        banned: row.try_get("banned")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn endpoint_from_row(row: &PgRow) -> Result<Endpoint, StoreError> {
    Ok(Endpoint {
        id: row.try_get("id")?,
        reference: row.try_get("reference")?,
        owner_id: row.try_get("owner_id")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[async_trait::async_trait]
impl Datastore for PostgresStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, fingerprint, banned, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.fingerprint)
        .bind(user.banned)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn find_user_by_fingerprint(&self, fingerprint: &str) -> Result<User, StoreError> {
        let row = sqlx::query(
            "SELECT id, fingerprint, banned, created_at, updated_at, deleted_at
             FROM users WHERE fingerprint = $1 AND deleted_at IS NULL",
        )
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fetch_error)?;

        user_from_row(&row)
    }

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO endpoints (id, reference, owner_id, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(endpoint.id)
        .bind(&endpoint.reference)
        .bind(endpoint.owner_id)
        .bind(endpoint.active)
        .bind(endpoint.created_at)
        .bind(endpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn find_endpoint_by_reference(&self, reference: &str) -> Result<Endpoint, StoreError> {
        let row = sqlx::query(
            "SELECT id, reference, owner_id, active, created_at, updated_at, deleted_at
             FROM endpoints WHERE reference = $1 AND deleted_at IS NULL",
        )
        .bind(reference)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fetch_error)?;

        endpoint_from_row(&row)
    }

    async fn latest_endpoint(&self, owner_id: Uuid) -> Result<Endpoint, StoreError> {
        let row = sqlx::query(
            "SELECT id, reference, owner_id, active, created_at, updated_at, deleted_at
             FROM endpoints
             WHERE owner_id = $1 AND active AND deleted_at IS NULL
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fetch_error)?;

        endpoint_from_row(&row)
    }

    async fn create_request(&self, record: &IngestedRequest) -> Result<(), StoreError> {
        let headers = serde_json::to_value(&record.payload.headers)?;

        sqlx::query(
            "INSERT INTO ingested_requests
                 (id, endpoint_id, body, query, headers, source_ip, size,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.id)
        .bind(record.endpoint_id)
        .bind(&record.payload.body)
        .bind(&record.payload.query)
        .bind(headers)
        .bind(record.payload.source_ip.map(|ip| ip.to_string()))
        .bind(record.payload.size as i64)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn purge_requests(&self, before: DateTime<Utc>, soft: bool) -> Result<u64, StoreError> {
        let affected = if soft {
            sqlx::query(
                "UPDATE ingested_requests
                 SET deleted_at = $1, updated_at = $1
                 WHERE created_at < $2 AND deleted_at IS NULL",
            )
            .bind(Utc::now())
            .bind(before)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query("DELETE FROM ingested_requests WHERE created_at < $1")
                .bind(before)
                .execute(&self.pool)
                .await?
                .rows_affected()
        };

        Ok(affected)
    }
}
