//! Capture pipeline
//!
//! The three pieces that turn an inbound HTTP call into a persisted,
//! broadcast record: identity resolution, endpoint creation/reuse, and
//! ingestion itself. Everything here talks to the datastore through the
//! [`Datastore`](crate::store::Datastore) trait and to live sessions
//! through the [`BroadcastHub`](crate::hub::BroadcastHub); both are
//! injected, never ambient.

pub mod identity;
pub mod ingestor;
pub mod registry;

pub use identity::IdentityResolver;
pub use ingestor::CaptureIngestor;
pub use registry::EndpointRegistry;
