//! Broadcast event types
//!
//! The hub carries a transient, non-owning copy of each captured request.
//! The wire payload is encoded once at publish time and shared by all
//! subscribers via `Bytes` reference counting.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{CapturedPayload, IngestedRequest};

/// The JSON shape delivered to live sessions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventPayload {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub request: CapturedPayload,
}

/// An event fanned out to all subscribers of a topic.
///
/// Cheap to clone: the encoded payload is reference-counted, not copied.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Id of the persisted record this event mirrors.
    pub id: Uuid,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// JSON-encoded [`EventPayload`].
    pub data: Bytes,
}

impl RequestEvent {
    /// Encode a persisted record into its delivery form.
    pub fn from_record(record: &IngestedRequest) -> Result<Self, serde_json::Error> {
        let payload = EventPayload {
            id: record.id,
            created_at: record.created_at,
            request: record.payload.clone(),
        };

        Ok(Self {
            id: record.id,
            created_at: record.created_at,
            data: Bytes::from(serde_json::to_vec(&payload)?),
        })
    }

    /// Decode the wire payload back into its structured form.
    pub fn decode(&self) -> Result<EventPayload, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_round_trip() {
        let record = IngestedRequest::new(
            Uuid::new_v4(),
            CapturedPayload {
                body: r#"{"a":1}"#.into(),
                query: "a=1".into(),
                headers: vec![("x-test".into(), "1".into())],
                source_ip: Some("10.0.0.1".parse().unwrap()),
                size: 7,
            },
        );

        let event = RequestEvent::from_record(&record).unwrap();
        assert_eq!(event.id, record.id);

        let decoded = event.decode().unwrap();
        assert_eq!(decoded.id, record.id);
        assert_eq!(decoded.request, record.payload);
    }

    #[test]
    fn test_clone_shares_payload() {
        let record = IngestedRequest::new(
            Uuid::new_v4(),
            CapturedPayload {
                body: "hello".into(),
                query: String::new(),
                headers: Vec::new(),
                source_ip: None,
                size: 5,
            },
        );

        let event = RequestEvent::from_record(&record).unwrap();
        let copy = event.clone();

        // Same backing allocation.
        assert_eq!(event.data.as_ptr(), copy.data.as_ptr());
    }
}
