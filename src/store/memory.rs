//! In-memory datastore
//!
//! Backs the test suite and small single-process deployments. Enforces the
//! same uniqueness constraints as the SQL backends so conflict handling is
//! exercised identically.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Endpoint, IngestedRequest, User};

use super::{Datastore, StoreError};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    endpoints: Vec<Endpoint>,
    requests: Vec<IngestedRequest>,
}

/// Datastore held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored request by id, soft-deleted rows included.
    ///
    /// Test helper; not part of the [`Datastore`] capability set.
    pub async fn find_request(&self, id: Uuid) -> Option<IngestedRequest> {
        let inner = self.inner.read().await;
        inner.requests.iter().find(|r| r.id == id).cloned()
    }

    /// Number of stored requests, soft-deleted rows included.
    pub async fn request_count(&self) -> usize {
        self.inner.read().await.requests.len()
    }
}

#[async_trait::async_trait]
impl Datastore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if inner.users.iter().any(|u| u.fingerprint == user.fingerprint) {
            return Err(StoreError::Conflict);
        }

        inner.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_fingerprint(&self, fingerprint: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().await;

        inner
            .users
            .iter()
            .find(|u| u.fingerprint == fingerprint && u.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if inner.endpoints.iter().any(|e| e.reference == endpoint.reference) {
            return Err(StoreError::Conflict);
        }

        inner.endpoints.push(endpoint.clone());
        Ok(())
    }

    async fn find_endpoint_by_reference(&self, reference: &str) -> Result<Endpoint, StoreError> {
        let inner = self.inner.read().await;

        inner
            .endpoints
            .iter()
            .find(|e| e.reference == reference && e.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn latest_endpoint(&self, owner_id: Uuid) -> Result<Endpoint, StoreError> {
        let inner = self.inner.read().await;

        inner
            .endpoints
            .iter()
            .filter(|e| e.owner_id == owner_id && e.active && e.deleted_at.is_none())
            .max_by_key(|e| e.created_at)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_request(&self, record: &IngestedRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if inner.requests.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Conflict);
        }

        inner.requests.push(record.clone());
        Ok(())
    }

    async fn purge_requests(&self, before: DateTime<Utc>, soft: bool) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;

        if soft {
            let now = Utc::now();
            let mut affected = 0;
            for record in inner
                .requests
                .iter_mut()
                .filter(|r| r.created_at < before && r.deleted_at.is_none())
            {
                record.deleted_at = Some(now);
                record.updated_at = now;
                affected += 1;
            }
            Ok(affected)
        } else {
            let len_before = inner.requests.len();
            inner.requests.retain(|r| r.created_at >= before);
            Ok((len_before - inner.requests.len()) as u64)
        }
    }
}
