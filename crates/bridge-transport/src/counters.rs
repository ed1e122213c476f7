use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic telemetry counters maintained by a transport supervisor.
#[derive(Debug, Default)]
pub struct TransportCounters {
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_failed: AtomicU64,
    pub reconnections: AtomicU64,
}

impl TransportCounters {
    pub fn snapshot(&self) -> TransportCounterSnapshot {
        TransportCounterSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            reconnections: self.reconnections.load(Ordering::Relaxed),
        }
    }

    pub fn inc_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_reconnections(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }
}

/// Plain-data snapshot of [`TransportCounters`], suitable for serialization
/// over the HTTP `/stats` endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransportCounterSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_failed: u64,
    pub reconnections: u64,
}
