//! Topic entries and subscription handles
//!
//! A topic is the per-endpoint fan-out point. A [`Subscription`] is the
//! mandatory-release delivery handle: dropping it returns the subscriber
//! slot, so every session exit path releases its handle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::broadcast;

use super::event::RequestEvent;

/// Fan-out state for a single endpoint reference.
pub struct Topic {
    tx: broadcast::Sender<RequestEvent>,

    /// Number of live subscriptions.
    pub(super) subscriber_count: AtomicU32,

    /// Last subscribe or publish, used by cleanup to spot idle topics.
    last_activity: Mutex<Instant>,
}

impl Topic {
    pub(super) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);

        Self {
            tx,
            subscriber_count: AtomicU32::new(0),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Get the number of live subscriptions.
    pub fn subscriber_count(&self) -> u32 {
        self.subscriber_count.load(Ordering::Acquire)
    }

    pub(super) fn touch(&self) {
        if let Ok(mut at) = self.last_activity.lock() {
            *at = Instant::now();
        }
    }

    pub(super) fn idle_for(&self) -> std::time::Duration {
        self.last_activity
            .lock()
            .map(|at| at.elapsed())
            .unwrap_or_default()
    }

    pub(super) fn subscribe(&self) -> broadcast::Receiver<RequestEvent> {
        self.tx.subscribe()
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of receivers the event reached; 0 if nobody is
    /// listening, in which case the event is simply gone.
    pub(super) fn publish(&self, event: RequestEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

/// A live delivery handle bound to one topic.
///
/// Exactly one owner; releasing it (explicitly via [`Subscription::close`]
/// or implicitly on drop) returns the subscriber slot. A handle that is
/// never released would leave its topic permanently subscribed, so release
/// is a correctness requirement, not an optimization.
pub struct Subscription {
    reference: String,
    topic: std::sync::Arc<Topic>,
    rx: broadcast::Receiver<RequestEvent>,
}

impl Subscription {
    pub(super) fn new(
        reference: String,
        topic: std::sync::Arc<Topic>,
        rx: broadcast::Receiver<RequestEvent>,
    ) -> Self {
        Self { reference, topic, rx }
    }

    /// The endpoint reference this subscription watches.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Wait for the next event.
    ///
    /// `Err(RecvError::Lagged(n))` means this subscriber fell behind and
    /// lost `n` events; the subscription is still live and the next call
    /// resumes at the oldest retained event.
    pub async fn recv(&mut self) -> Result<RequestEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    /// Release the subscription explicitly.
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let prev = self.topic.subscriber_count.fetch_sub(1, Ordering::AcqRel);

        tracing::debug!(
            reference = %self.reference,
            subscribers = prev.saturating_sub(1),
            "Subscriber released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let topic = Topic::new(4);

        let record = crate::model::IngestedRequest::new(
            uuid::Uuid::new_v4(),
            crate::model::CapturedPayload {
                body: "{}".into(),
                query: String::new(),
                headers: Vec::new(),
                source_ip: None,
                size: 2,
            },
        );
        let event = RequestEvent::from_record(&record).unwrap();

        assert_eq!(topic.publish(event), 0);
    }
}
