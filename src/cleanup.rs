//! Retention purge
//!
//! Removes captured requests older than a cutoff, either by marking them
//! deleted or by dropping the rows. Users and endpoints are never touched.
//! Running the purge twice with the same cutoff is a no-op the second time.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::store::Datastore;

/// Purge captured requests created before `before`.
///
/// Returns the number of records affected.
pub async fn purge(store: &dyn Datastore, before: DateTime<Utc>, soft: bool) -> Result<u64> {
    let purged = store.purge_requests(before, soft).await?;

    if purged > 0 {
        tracing::info!(
            purged = purged,
            before = %before,
            soft = soft,
            "Purged expired requests"
        );
    } else {
        tracing::debug!(before = %before, "Nothing to purge");
    }

    Ok(purged)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use uuid::Uuid;

    use crate::model::{CapturedPayload, Endpoint, IngestedRequest, User};
    use crate::store::MemoryStore;

    use super::*;

    async fn seed_request(store: &MemoryStore) -> IngestedRequest {
        let user = User::new(format!("SHA256:{}", Uuid::new_v4()));
        store.create_user(&user).await.unwrap();
        let endpoint = Endpoint::new(user.id);
        store.create_endpoint(&endpoint).await.unwrap();

        let record = IngestedRequest::new(
            endpoint.id,
            CapturedPayload {
                body: "{}".into(),
                query: String::new(),
                headers: Vec::new(),
                source_ip: None,
                size: 2,
            },
        );
        store.create_request(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_purge_respects_cutoff() {
        let store = Arc::new(MemoryStore::new());
        let record = seed_request(&store).await;

        // Cutoff before the record: nothing to do.
        let purged = purge(
            store.as_ref(),
            record.created_at - Duration::hours(1),
            false,
        )
        .await
        .unwrap();
        assert_eq!(purged, 0);

        // Cutoff after the record: it goes.
        let purged = purge(store.as_ref(), Utc::now() + Duration::hours(1), false)
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_soft_purge_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        seed_request(&store).await;

        let cutoff = Utc::now() + Duration::hours(1);

        let first = purge(store.as_ref(), cutoff, true).await.unwrap();
        assert_eq!(first, 1);

        let second = purge(store.as_ref(), cutoff, true).await.unwrap();
        assert_eq!(second, 0);
    }
}
