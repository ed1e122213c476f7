//! Shared contract between the mesh and secure transport supervisors:
//! the `Transport` trait itself, the atomic counters every supervisor
//! exposes over `/stats`, and the reconnect-with-backoff helper both
//! supervisors drive their reconnect loop with.

pub mod counters;
pub mod reconnect;
pub mod transport;

pub use counters::{TransportCounterSnapshot, TransportCounters};
pub use reconnect::{can_send, reconnect_with_backoff, ReconnectPolicy};
pub use transport::Transport;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn delay_grows_and_caps() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            max_delay: Duration::from_secs(300),
            max_attempts: 10,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert!(policy.delay_for(1) > Duration::from_secs(5));
        assert_eq!(policy.delay_for(20), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn reconnect_succeeds_before_budget_exhausted() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(5),
            max_attempts: 5,
        };
        let counters = TransportCounters::default();
        let tries = AtomicU32::new(0);
        let ok = reconnect_with_backoff(&policy, &counters, "test", || {
            let n = tries.fetch_add(1, Ordering::SeqCst);
            async move { n >= 2 }
        })
        .await;
        assert!(ok);
        assert_eq!(counters.snapshot().reconnections, 3);
    }

    #[tokio::test]
    async fn reconnect_gives_up_after_max_attempts() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(1),
            max_attempts: 3,
        };
        let counters = TransportCounters::default();
        let ok = reconnect_with_backoff(&policy, &counters, "test", || async { false }).await;
        assert!(!ok);
        assert_eq!(counters.snapshot().reconnections, 3);
    }
}
