//! SQLite datastore
//!
//! Embedded alternative to Postgres for single-host deployments. Ids are
//! stored as hyphenated text; everything else mirrors the Postgres schema.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::model::{Endpoint, IngestedRequest, User};

use super::{map_fetch_error, map_insert_error, Datastore, StoreError};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        fingerprint TEXT NOT NULL UNIQUE,
        banned INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS endpoints (
        id TEXT PRIMARY KEY,
        reference TEXT NOT NULL UNIQUE,
        owner_id TEXT NOT NULL REFERENCES users (id),
        active INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS ingested_requests (
        id TEXT PRIMARY KEY,
        endpoint_id TEXT NOT NULL REFERENCES endpoints (id),
        body TEXT NOT NULL,
        query TEXT NOT NULL,
        headers TEXT NOT NULL,
        source_ip TEXT,
        size INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_endpoints_owner_created
        ON endpoints (owner_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_ingested_requests_created
        ON ingested_requests (created_at)",
];

/// Datastore backed by an embedded SQLite database.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at the given DSN and ensure
    /// the schema exists.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(dsn)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

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

fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|_| StoreError::Corrupt(format!("bad uuid: {raw}")))
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: parse_id(row.try_get("id")?)?,
        fingerprint: row.try_get("fingerprint")?,
        banned: row.try_get("banned")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn endpoint_from_row(row: &SqliteRow) -> Result<Endpoint, StoreError> {
    Ok(Endpoint {
        id: parse_id(row.try_get("id")?)?,
        reference: row.try_get("reference")?,
        owner_id: parse_id(row.try_get("owner_id")?)?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[async_trait::async_trait]
impl Datastore for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, fingerprint, banned, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
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
             FROM users WHERE fingerprint = ? AND deleted_at IS NULL",
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
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(endpoint.id.to_string())
        .bind(&endpoint.reference)
        .bind(endpoint.owner_id.to_string())
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
             FROM endpoints WHERE reference = ? AND deleted_at IS NULL",
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
             WHERE owner_id = ? AND active AND deleted_at IS NULL
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(owner_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_fetch_error)?;

        endpoint_from_row(&row)
    }

    async fn create_request(&self, record: &IngestedRequest) -> Result<(), StoreError> {
        let headers = serde_json::to_string(&record.payload.headers)?;

        sqlx::query(
            "INSERT INTO ingested_requests
                 (id, endpoint_id, body, query, headers, source_ip, size,
                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.endpoint_id.to_string())
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
                 SET deleted_at = ?, updated_at = ?
                 WHERE created_at < ? AND deleted_at IS NULL",
            )
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(before)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query("DELETE FROM ingested_requests WHERE created_at < ?")
                .bind(before)
                .execute(&self.pool)
                .await?
                .rows_affected()
        };

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let store = open().await;

        let user = User::new("SHA256:abc");
        store.create_user(&user).await.unwrap();

        let found = store.find_user_by_fingerprint("SHA256:abc").await.unwrap();
        assert_eq!(found.id, user.id);
        assert!(!found.banned);
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint_conflicts() {
        let store = open().await;

        store.create_user(&User::new("SHA256:abc")).await.unwrap();
        let err = store.create_user(&User::new("SHA256:abc")).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_endpoint_lookup_and_reuse_order() {
        let store = open().await;

        let user = User::new("SHA256:abc");
        store.create_user(&user).await.unwrap();

        let mut first = Endpoint::new(user.id);
        first.created_at = Utc::now() - chrono::Duration::seconds(60);
        store.create_endpoint(&first).await.unwrap();

        let second = Endpoint::new(user.id);
        store.create_endpoint(&second).await.unwrap();

        let latest = store.latest_endpoint(user.id).await.unwrap();
        assert_eq!(latest.id, second.id);

        let by_reference = store
            .find_endpoint_by_reference(&first.reference)
            .await
            .unwrap();
        assert_eq!(by_reference.id, first.id);

        let err = store
            .find_endpoint_by_reference("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_request_insert_and_purge() {
        let store = open().await;

        let user = User::new("SHA256:abc");
        store.create_user(&user).await.unwrap();
        let endpoint = Endpoint::new(user.id);
        store.create_endpoint(&endpoint).await.unwrap();

        let mut old = IngestedRequest::new(
            endpoint.id,
            crate::model::CapturedPayload {
                body: r#"{"a":1}"#.into(),
                query: "a=1".into(),
                headers: vec![("content-type".into(), "application/json".into())],
                source_ip: Some("127.0.0.1".parse().unwrap()),
                size: 7,
            },
        );
        old.created_at = Utc::now() - chrono::Duration::hours(48);
        store.create_request(&old).await.unwrap();

        let affected = store
            .purge_requests(Utc::now() - chrono::Duration::hours(24), true)
            .await
            .unwrap();
        assert_eq!(affected, 1);

        // Already soft-deleted rows are not touched again.
        let affected = store
            .purge_requests(Utc::now() - chrono::Duration::hours(24), true)
            .await
            .unwrap();
        assert_eq!(affected, 0);

        let affected = store
            .purge_requests(Utc::now() - chrono::Duration::hours(24), false)
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }
}
