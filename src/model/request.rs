//! Captured request records
//!
//! An ingested request is immutable once persisted. The body is stored as
//! raw text and is not required to be well-formed JSON; the `size` field
//! records the number of bytes actually copied from the wire, capped at
//! the configured maximum.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The caller-visible parts of a captured HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CapturedPayload {
    /// Raw body text, unvalidated.
    pub body: String,
    /// Encoded query string, may be empty.
    pub query: String,
    /// Ordered multi-map of headers as they arrived.
    pub headers: Vec<(String, String)>,
    /// Resolved source address, if one could be determined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<IpAddr>,
    /// Bytes actually read from the body stream.
    pub size: u64,
}

/// One persisted capture against an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IngestedRequest {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub payload: CapturedPayload,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl IngestedRequest {
    /// Create a new record for an endpoint.
    pub fn new(endpoint_id: Uuid, payload: CapturedPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            payload,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
