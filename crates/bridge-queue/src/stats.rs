use serde::{Deserialize, Serialize};

/// Running counters surfaced by `DurableQueue::status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(default)]
    pub total_queued: u64,
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub total_failed: u64,
    #[serde(default)]
    pub total_retried: u64,
    #[serde(default)]
    pub avg_queue_time_ms: f64,
}

impl QueueStats {
    /// Fold one more delivered message's queue time into the running
    /// average.
    pub fn record_delivery(&mut self, queue_time_ms: f64) {
        self.total_sent += 1;
        let total = self.total_sent as f64;
        self.avg_queue_time_ms = (self.avg_queue_time_ms * (total - 1.0) + queue_time_ms) / total;
    }
}
