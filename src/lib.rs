//! reqsink
//!
//! Disposable HTTP inspection endpoints with live request capture.
//!
//! A caller obtains an endpoint scoped to their identity, points any HTTP
//! client at it, and watches captured requests arrive in real time over
//! SSE. Captured requests are persisted before anything is broadcast, so
//! a disconnected viewer never costs the sender an ingestion.
//!
//! The crate splits along those lines:
//!
//! - [`model`]: users, endpoints, and captured requests
//! - [`store`]: the [`Datastore`](store::Datastore) trait with Postgres,
//!   SQLite, and in-memory backends
//! - [`hub`]: in-process publish/subscribe fan-out of captured requests
//! - [`session`]: bridges hub deliveries into a session's event loop
//! - [`ingest`]: identity resolution, endpoint creation, ingestion
//! - [`server`]: the axum HTTP surface
//! - [`cleanup`]: retention purge of expired captures

pub mod cleanup;
pub mod config;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod model;
pub mod server;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use hub::{BroadcastHub, HubConfig, RequestEvent};
pub use server::{AppState, ServerConfig};
pub use session::{BridgeMessage, SessionBridge};
