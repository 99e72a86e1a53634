//! Hub configuration

use std::time::Duration;

/// Tunables for the broadcast hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each topic's broadcast channel. A subscriber that falls
    /// further behind than this loses events (drop-if-full policy).
    pub per_topic_capacity: usize,

    /// How long a topic with zero subscribers and no publishes may linger
    /// before cleanup removes it.
    pub idle_topic_timeout: Duration,

    /// Interval between cleanup passes.
    pub cleanup_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            per_topic_capacity: 64,
            idle_topic_timeout: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    /// Set the per-topic channel capacity.
    pub fn per_topic_capacity(mut self, capacity: usize) -> Self {
        self.per_topic_capacity = capacity.max(1);
        self
    }

    /// Set the idle topic timeout.
    pub fn idle_topic_timeout(mut self, timeout: Duration) -> Self {
        self.idle_topic_timeout = timeout;
        self
    }

    /// Set the cleanup interval.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.per_topic_capacity, 64);
        assert_eq!(config.idle_topic_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .per_topic_capacity(8)
            .idle_topic_timeout(Duration::from_secs(5))
            .cleanup_interval(Duration::from_secs(1));

        assert_eq!(config.per_topic_capacity, 8);
        assert_eq!(config.idle_topic_timeout, Duration::from_secs(5));
        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_capacity_floor() {
        let config = HubConfig::default().per_topic_capacity(0);

        assert_eq!(config.per_topic_capacity, 1);
    }
}
