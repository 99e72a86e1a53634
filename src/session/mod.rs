//! Live session bridge
//!
//! A session (an SSE connection, or a terminal UI on the other side of an
//! SSH channel) consumes events from a single loop. The bridge subscribes
//! to an endpoint's topic on the hub and forwards each asynchronously
//! delivered event into that loop as a loop-native message, preserving
//! arrival order.
//!
//! Releasing the underlying subscription on every exit path is a
//! correctness requirement: the bridge owns a stop signal whose drop
//! unblocks the forwarding task's pending `recv`, which in turn drops the
//! subscription and returns the subscriber slot.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};

use crate::hub::{BroadcastHub, RequestEvent};

/// Capacity of the bridge's loop-side channel.
const BRIDGE_CHANNEL_CAPACITY: usize = 32;

/// A message delivered into the session's event loop.
#[derive(Debug, Clone)]
pub enum BridgeMessage {
    /// The bridge is attached and awaiting the first request.
    Attached { reference: String },

    /// A captured request arrived.
    Request(RequestEvent),

    /// The session fell behind and `missed` events were dropped.
    Lagged { missed: u64 },
}

/// Bridges hub deliveries into a session's single-consumer event loop.
pub struct SessionBridge {
    events: mpsc::Receiver<BridgeMessage>,

    // Dropping the sender resolves the forwarding task's stop future.
    _stop: oneshot::Sender<()>,
}

impl SessionBridge {
    /// Subscribe to an endpoint's topic and start forwarding.
    ///
    /// The first message is always [`BridgeMessage::Attached`]; captured
    /// requests follow in publish order.
    pub async fn attach(hub: &Arc<BroadcastHub>, reference: &str) -> Self {
        let mut subscription = hub.subscribe(reference).await;
        let (tx, events) = mpsc::channel(BRIDGE_CHANNEL_CAPACITY);
        let (stop, mut stopped) = oneshot::channel::<()>();

        let reference = reference.to_owned();
        tokio::spawn(async move {
            if tx
                .send(BridgeMessage::Attached {
                    reference: reference.clone(),
                })
                .await
                .is_err()
            {
                return;
            }

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    received = subscription.recv() => match received {
                        Ok(event) => {
                            if tx.send(BridgeMessage::Request(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(
                                reference = %reference,
                                missed = missed,
                                "Session fell behind, events dropped"
                            );

                            if tx.send(BridgeMessage::Lagged { missed }).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }

            tracing::debug!(reference = %reference, "Session bridge detached");
            // `subscription` drops here, releasing the subscriber slot.
        });

        Self { events, _stop: stop }
    }

    /// Wait for the next message, or `None` once the bridge has detached.
    pub async fn next_message(&mut self) -> Option<BridgeMessage> {
        self.events.recv().await
    }

    /// Detach explicitly. Dropping the bridge has the same effect.
    pub fn close(self) {}
}

impl futures::Stream for SessionBridge {
    type Item = BridgeMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use crate::model::{CapturedPayload, IngestedRequest};

    use super::*;

    fn event(body: &str) -> RequestEvent {
        let record = IngestedRequest::new(
            Uuid::new_v4(),
            CapturedPayload {
                body: body.into(),
                query: String::new(),
                headers: Vec::new(),
                source_ip: None,
                size: body.len() as u64,
            },
        );
        RequestEvent::from_record(&record).unwrap()
    }

    #[tokio::test]
    async fn test_attached_comes_first() {
        let hub = Arc::new(BroadcastHub::new());
        let mut bridge = SessionBridge::attach(&hub, "ref1").await;

        match bridge.next_message().await {
            Some(BridgeMessage::Attached { reference }) => assert_eq!(reference, "ref1"),
            other => panic!("expected Attached, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_events_preserve_publish_order() {
        let hub = Arc::new(BroadcastHub::new());
        let mut bridge = SessionBridge::attach(&hub, "ref1").await;

        // Skip the Attached marker.
        bridge.next_message().await.unwrap();

        let first = event("first");
        let second = event("second");
        hub.publish("ref1", first.clone()).await;
        hub.publish("ref1", second.clone()).await;

        match bridge.next_message().await {
            Some(BridgeMessage::Request(ev)) => assert_eq!(ev.id, first.id),
            other => panic!("expected Request, got {other:?}"),
        }
        match bridge.next_message().await {
            Some(BridgeMessage::Request(ev)) => assert_eq!(ev.id, second.id),
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let hub = Arc::new(BroadcastHub::new());

        let bridge = SessionBridge::attach(&hub, "ref1").await;
        assert_eq!(hub.subscriber_count("ref1").await, 1);

        drop(bridge);

        // The forwarding task wakes on the stop signal and drops the
        // subscription shortly after.
        let mut released = false;
        for _ in 0..50 {
            if hub.subscriber_count("ref1").await == 0 {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(released, "subscription was not released on drop");
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let hub = Arc::new(BroadcastHub::new());

        let bridge = SessionBridge::attach(&hub, "ref1").await;
        bridge.close();

        let mut released = false;
        for _ in 0..50 {
            if hub.subscriber_count("ref1").await == 0 {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(released, "subscription was not released on close");
    }
}
