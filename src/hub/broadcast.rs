//! Broadcast hub implementation
//!
//! The central registry of topics, keyed by endpoint reference. Shared by
//! every ingestion task and live session; all topic-map mutations go
//! through the `RwLock`, while delivery itself happens outside it via each
//! topic's broadcast channel so a slow consumer never stalls a publisher.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::HubConfig;
use super::event::RequestEvent;
use super::topic::{Subscription, Topic};

/// In-process publish/subscribe registry for captured requests.
pub struct BroadcastHub {
    /// Map of endpoint reference to topic.
    topics: RwLock<HashMap<String, Arc<Topic>>>,

    /// Configuration
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a new hub with default configuration.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration.
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Subscribe to an endpoint's topic, creating the topic if absent.
    ///
    /// Returns immediately; the subscription only sees events published
    /// after this call. There is no replay.
    pub async fn subscribe(&self, reference: &str) -> Subscription {
        let mut topics = self.topics.write().await;

        let topic = topics
            .entry(reference.to_owned())
            .or_insert_with(|| Arc::new(Topic::new(self.config.per_topic_capacity)));

        topic.touch();
        let rx = topic.subscribe();
        topic.subscriber_count.fetch_add(1, Ordering::AcqRel);

        tracing::info!(
            reference = %reference,
            subscribers = topic.subscriber_count(),
            "Subscriber added"
        );

        Subscription::new(reference.to_owned(), Arc::clone(topic), rx)
    }

    /// Publish an event to an endpoint's topic.
    ///
    /// Creates the topic if absent. With zero subscribers the event is
    /// dropped; that is a no-op, not an error. Returns the number of
    /// subscribers the event reached. Never fails loudly to the caller:
    /// any internal delivery problem ends here, in the logs.
    pub async fn publish(&self, reference: &str, event: RequestEvent) -> usize {
        let topics = self.topics.read().await;

        if let Some(topic) = topics.get(reference) {
            topic.touch();
            let delivered = topic.publish(event);

            if delivered == 0 {
                tracing::debug!(reference = %reference, "No subscribers, event dropped");
            } else {
                tracing::debug!(
                    reference = %reference,
                    delivered = delivered,
                    "Event published"
                );
            }

            return delivered;
        }
        drop(topics);

        // First publish for this reference: create the topic so that the
        // next subscriber finds it, then drop the event (no replay).
        let mut topics = self.topics.write().await;
        topics
            .entry(reference.to_owned())
            .or_insert_with(|| Arc::new(Topic::new(self.config.per_topic_capacity)))
            .touch();

        tracing::debug!(reference = %reference, "No subscribers, event dropped");
        0
    }

    /// Check whether a topic exists for a reference.
    pub async fn topic_exists(&self, reference: &str) -> bool {
        self.topics.read().await.contains_key(reference)
    }

    /// Get the number of live subscribers for a reference.
    pub async fn subscriber_count(&self, reference: &str) -> u32 {
        let topics = self.topics.read().await;
        topics
            .get(reference)
            .map(|t| t.subscriber_count())
            .unwrap_or(0)
    }

    /// Get the total number of topics.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }

    /// Run one cleanup pass.
    ///
    /// Removes topics with zero subscribers that have been idle longer
    /// than `idle_topic_timeout`. Retaining a topic longer is harmless,
    /// removing one is too: the next subscribe or publish recreates it.
    pub async fn cleanup(&self) {
        let mut topics = self.topics.write().await;

        let stale: Vec<String> = topics
            .iter()
            .filter(|(_, topic)| {
                topic.subscriber_count() == 0
                    && topic.idle_for() > self.config.idle_topic_timeout
            })
            .map(|(reference, _)| reference.clone())
            .collect();

        for reference in stale {
            topics.remove(&reference);
            tracing::info!(reference = %reference, "Topic removed by cleanup");
        }
    }

    /// Spawn the background cleanup task.
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let interval = hub.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                hub.cleanup().await;
            }
        })
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
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
    async fn test_subscriber_before_publish_receives_event() {
        let hub = BroadcastHub::new();

        let mut subscription = hub.subscribe("ref1").await;

        let sent = event(r#"{"a":1}"#);
        let delivered = hub.publish("ref1", sent.clone()).await;
        assert_eq!(delivered, 1);

        let received = subscription.recv().await.unwrap();
        assert_eq!(received.id, sent.id);
        assert_eq!(received.data, sent.data);
    }

    #[tokio::test]
    async fn test_subscriber_after_publish_sees_nothing() {
        let hub = BroadcastHub::new();

        // Publish before anyone subscribes: the event is dropped.
        assert_eq!(hub.publish("ref1", event("early")).await, 0);
        // The topic was still lazily created.
        assert!(hub.topic_exists("ref1").await);

        let mut subscription = hub.subscribe("ref1").await;

        // Only events published after the subscribe arrive.
        let late = event("late");
        hub.publish("ref1", late.clone()).await;

        let received = subscription.recv().await.unwrap();
        assert_eq!(received.id, late.id);
    }

    #[tokio::test]
    async fn test_fan_out_reaches_all_subscribers_in_order() {
        let hub = BroadcastHub::new();

        let mut first = hub.subscribe("ref1").await;
        let mut second = hub.subscribe("ref1").await;

        let a = event("a");
        let b = event("b");
        hub.publish("ref1", a.clone()).await;
        hub.publish("ref1", b.clone()).await;

        for subscription in [&mut first, &mut second] {
            assert_eq!(subscription.recv().await.unwrap().id, a.id);
            assert_eq!(subscription.recv().await.unwrap().id, b.id);
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let hub = BroadcastHub::new();

        let mut watcher = hub.subscribe("ref1").await;
        hub.publish("ref2", event("other")).await;

        let mine = event("mine");
        hub.publish("ref1", mine.clone()).await;

        // Only the event for our own topic arrives.
        assert_eq!(watcher.recv().await.unwrap().id, mine.id);
    }

    #[tokio::test]
    async fn test_drop_releases_subscriber_slot() {
        let hub = BroadcastHub::new();

        let subscription = hub.subscribe("ref1").await;
        assert_eq!(hub.subscriber_count("ref1").await, 1);

        drop(subscription);
        assert_eq!(hub.subscriber_count("ref1").await, 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let config = HubConfig::default().per_topic_capacity(2);
        let hub = BroadcastHub::with_config(config);

        let mut slow = hub.subscribe("ref1").await;

        // Overflow the subscriber's channel; publishing never blocks.
        for i in 0..5 {
            hub.publish("ref1", event(&format!("e{i}"))).await;
        }

        let result = slow.recv().await;
        assert!(matches!(
            result,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_))
        ));

        // The subscription is still live and drains the retained tail.
        assert!(slow.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_removes_idle_topics_only() {
        let config = HubConfig::default().idle_topic_timeout(Duration::from_millis(0));
        let hub = BroadcastHub::with_config(config);

        let _live = hub.subscribe("watched").await;
        hub.publish("abandoned", event("x")).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        hub.cleanup().await;

        assert!(hub.topic_exists("watched").await);
        assert!(!hub.topic_exists("abandoned").await);
    }
}
