//! Persisted domain records
//!
//! Users, endpoints and ingested requests. Everything here is owned by the
//! datastore once created; the broadcast hub only ever sees the endpoint
//! reference as a routing key and a transient copy of each request.

pub mod endpoint;
pub mod request;
pub mod user;

pub use endpoint::{generate_reference, Endpoint, REFERENCE_LEN};
pub use request::{CapturedPayload, IngestedRequest};
pub use user::User;
