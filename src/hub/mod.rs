//! Broadcast hub for live request delivery
//!
//! The hub routes captured requests from the ingestion path to whichever
//! live sessions are watching an endpoint. It uses `tokio::sync::broadcast`
//! for fan-out so one slow subscriber lags and loses events instead of
//! applying backpressure to the ingestor or to other subscribers.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<BroadcastHub>
//!                     ┌─────────────────────────┐
//!                     │ topics: HashMap<Ref,    │
//!                     │   Topic {               │
//!                     │     tx: broadcast::Tx,  │
//!                     │     subscriber_count,   │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Ingestor]             [Session]               [Session]
//!    hub.publish()          subscription.recv()     subscription.recv()
//! ```
//!
//! Topics are created lazily on first subscribe or first publish; a publish
//! with no subscribers drops the event. There is no buffering or replay: a
//! session attaching after a publish never sees that event.
//!
//! # Zero-Copy Design
//!
//! Each event carries its wire payload as `bytes::Bytes`, so fan-out clones
//! the `RequestEvent` but the encoded data is only reference-counted.

pub mod broadcast;
pub mod config;
pub mod event;
pub mod topic;

pub use broadcast::BroadcastHub;
pub use config::HubConfig;
pub use event::{EventPayload, RequestEvent};
pub use topic::{Subscription, Topic};
