//! Engine configuration

/// Default capacity of the broadcast channel shared by all sinks
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1000;

/// Default capacity of each subscriber's outbound queue
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1000;

/// Engine configuration options
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Records the broadcast channel holds before `LogSink::write` waits
    pub broadcast_capacity: usize,

    /// Records a subscriber may have queued before it is dropped
    pub subscriber_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Set the broadcast channel capacity (minimum 1)
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber queue capacity (minimum 1)
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }
}
