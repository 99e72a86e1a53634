//! Endpoint records and reference generation
//!
//! An endpoint is the public capture destination. Its `reference` is a
//! short URL-safe token that doubles as the routing key for live delivery.
//! References are generated server-side, never derived from user input,
//! and immutable once assigned.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Length of generated reference tokens.
///
/// 16 alphanumeric characters gives ~95 bits of entropy; a collision at
/// expected scale is treated as a fatal insert error and retried with a
/// fresh token.
pub const REFERENCE_LEN: usize = 16;

/// Generate a new URL-safe reference token.
pub fn generate_reference() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_LEN)
        .map(char::from)
        .collect()
}

/// A capture destination owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    /// Public, unguessable routing token. Globally unique and immutable.
    pub reference: String,
    pub owner_id: Uuid,
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Endpoint {
    /// Create a new active endpoint for an owner, with a fresh reference.
    pub fn new(owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference: generate_reference(),
            owner_id,
            active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Replace the reference with a freshly generated token.
    ///
    /// Only valid before the endpoint is persisted; used when an insert
    /// collides on the reference uniqueness constraint.
    pub fn regenerate_reference(&mut self) {
        self.reference = generate_reference();
    }

    /// Name of the pub/sub channel live sessions subscribe to.
    pub fn pub_channel(&self) -> String {
        format!("messages.{}", self.reference)
    }
}
