use std::future::Future;
use std::time::Duration;

use bridge_model::ConnectionState;
use tracing::{info, warn};

use crate::counters::TransportCounters;

/// Reconnection policy: exponential backoff with a hard cap and a bounded
/// number of attempts before the transport is declared permanently FAILED.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}

/// Drive a reconnect loop: sleep with growing backoff, then attempt
/// `connect` again, up to `policy.max_attempts` times. Returns `true` on
/// the attempt that succeeds, `false` if the attempt budget is exhausted.
///
/// Callers own the resulting `ConnectionState` transition; this helper only
/// drives the timing and counts each attempt.
pub async fn reconnect_with_backoff<F, Fut>(
    policy: &ReconnectPolicy,
    counters: &TransportCounters,
    transport_name: &str,
    mut connect: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);
        tokio::time::sleep(delay).await;
        counters.inc_reconnections();
        if connect().await {
            info!(transport = transport_name, attempt, "reconnected");
            return true;
        }
        warn!(transport = transport_name, attempt, ?delay, "reconnect attempt failed");
    }
    false
}

/// Whether `state` permits sending.
pub fn can_send(state: ConnectionState) -> bool {
    matches!(state, ConnectionState::Connected)
}
