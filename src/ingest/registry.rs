//! Endpoint creation and reuse
//!
//! At most one reusable endpoint is handed out per owner: a plain request
//! returns the most recently created active endpoint, creating one only if
//! none exists. A forced request always mints a fresh endpoint, so owners
//! can rotate references at will while historical endpoints stay routable.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::Endpoint;
use crate::store::{Datastore, StoreError};

/// Attempts before a reference collision is treated as fatal.
const REFERENCE_RETRY_LIMIT: usize = 3;

/// Creates and resolves endpoints for owners.
pub struct EndpointRegistry {
    store: Arc<dyn Datastore>,
}

impl EndpointRegistry {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Get the owner's current endpoint, creating one if needed.
    ///
    /// With `force_new` set a fresh endpoint is always created and
    /// returned, with no dedup against existing ones.
    pub async fn get_or_create(&self, owner_id: Uuid, force_new: bool) -> Result<Endpoint> {
        if force_new {
            return self.create(owner_id).await;
        }

        match self.store.latest_endpoint(owner_id).await {
            Ok(endpoint) => {
                tracing::debug!(
                    owner_id = %owner_id,
                    reference = %endpoint.reference,
                    "Reusing endpoint"
                );
                Ok(endpoint)
            }
            Err(StoreError::NotFound) => self.create(owner_id).await,
            // Any other lookup failure is authoritative.
            Err(other) => Err(Error::Persistence(other)),
        }
    }

    async fn create(&self, owner_id: Uuid) -> Result<Endpoint> {
        let mut endpoint = Endpoint::new(owner_id);

        for attempt in 0..REFERENCE_RETRY_LIMIT {
            match self.store.create_endpoint(&endpoint).await {
                Ok(()) => {
                    tracing::info!(
                        owner_id = %owner_id,
                        reference = %endpoint.reference,
                        "Endpoint created"
                    );
                    return Ok(endpoint);
                }
                Err(StoreError::Conflict) => {
                    tracing::warn!(
                        owner_id = %owner_id,
                        attempt = attempt,
                        "Reference collision, regenerating token"
                    );
                    endpoint.regenerate_reference();
                }
                Err(other) => return Err(Error::Persistence(other)),
            }
        }

        Err(Error::Conflict)
    }
}
