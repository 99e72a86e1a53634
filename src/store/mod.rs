//! Durable storage for users, endpoints and ingested requests
//!
//! The datastore is the single source of truth. Business logic only ever
//! talks to the [`Datastore`] trait; the concrete backend (Postgres,
//! SQLite, or the in-memory store used by tests) is selected once at
//! startup and never branched on again.
//!
//! Soft-deleted rows are excluded from every read; only the retention job
//! decides between soft and hard deletes.

pub mod memory;
pub mod postgres;
pub mod sqlite;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Endpoint, IngestedRequest, User};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Error type for datastore operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No matching row.
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint fired.
    #[error("duplicate record")]
    Conflict,

    /// A row could not be mapped back into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Header encoding failed on the way in or out.
    #[error("could not encode headers")]
    Headers(#[from] serde_json::Error),

    /// The underlying database failed.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Capability set over the three persisted entities.
///
/// Inserts are row-atomic; no multi-row transactions are required by the
/// capture pipeline.
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Look up a user by fingerprint, excluding soft-deleted rows.
    async fn find_user_by_fingerprint(&self, fingerprint: &str) -> Result<User, StoreError>;

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError>;

    /// Look up an endpoint by its public reference.
    async fn find_endpoint_by_reference(&self, reference: &str) -> Result<Endpoint, StoreError>;

    /// The most recently created active endpoint for an owner.
    async fn latest_endpoint(&self, owner_id: Uuid) -> Result<Endpoint, StoreError>;

    async fn create_request(&self, record: &IngestedRequest) -> Result<(), StoreError>;

    /// Delete (or soft-delete) all ingested requests created before the
    /// cutoff. Returns the number of rows affected. Idempotent: already
    /// purged rows are not touched again.
    async fn purge_requests(&self, before: DateTime<Utc>, soft: bool) -> Result<u64, StoreError>;
}

/// Translate an insert failure, surfacing unique violations as conflicts.
pub(crate) fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::Conflict;
        }
    }
    StoreError::Database(err)
}

/// Translate a fetch result, surfacing missing rows as `NotFound`.
pub(crate) fn map_fetch_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Database(other),
    }
}
