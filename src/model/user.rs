//! User records
//!
//! A user is an opaque caller identity, keyed by a public-key fingerprint.
//! Created on first sight, never deleted by this core; the only mutation
//! that ever happens is flipping `banned`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A caller identity, scoped by fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique fingerprint, e.g. `SHA256:...` of an SSH public key.
    pub fingerprint: String,
    pub banned: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new, unbanned user for a fingerprint.
    pub fn new(fingerprint: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            fingerprint: fingerprint.into(),
            banned: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
