//! Identity resolution
//!
//! Maps an opaque caller fingerprint to a persisted user, creating one on
//! first sight. Two callers racing on the same unseen fingerprint are
//! resolved by the store's uniqueness constraint: the loser's insert
//! conflicts and is retried as a lookup.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::User;
use crate::store::{Datastore, StoreError};

/// Resolves caller fingerprints to users.
pub struct IdentityResolver {
    store: Arc<dyn Datastore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Look up the user for a fingerprint, creating one if absent.
    pub async fn resolve(&self, fingerprint: &str) -> Result<User> {
        if fingerprint.trim().is_empty() {
            return Err(Error::Validation("fingerprint must not be empty".into()));
        }

        match self.store.find_user_by_fingerprint(fingerprint).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => self.create(fingerprint).await,
            Err(other) => Err(Error::Persistence(other)),
        }
    }

    async fn create(&self, fingerprint: &str) -> Result<User> {
        let user = User::new(fingerprint);

        match self.store.create_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "User created");
                Ok(user)
            }
            // Lost a creation race; the winner's row is authoritative.
            Err(StoreError::Conflict) => {
                tracing::debug!("User creation raced, retrying lookup");

                match self.store.find_user_by_fingerprint(fingerprint).await {
                    Ok(user) => Ok(user),
                    Err(StoreError::NotFound) => Err(Error::UserNotFound),
                    Err(other) => Err(Error::Persistence(other)),
                }
            }
            Err(other) => Err(Error::Persistence(other)),
        }
    }
}
