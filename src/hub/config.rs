//! Hub configuration

/// Broadcast hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Events queued per subscriber before new events are dropped for it
    pub subscriber_capacity: usize,

    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_subscribers: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
            max_subscribers: 0,
        }
    }
}

impl HubConfig {
    /// Set the per-subscriber queue capacity
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }

    /// Set the subscriber limit
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }
}
