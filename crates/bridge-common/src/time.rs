use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Capture an instant suitable for scheduler comparisons.
pub fn monotonic_now() -> Instant {
    Instant::now()
}

/// Wall-clock timestamp used on every persisted record.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Exponential backoff with a hard cap, used by transport supervisors.
///
/// `attempt` is zero-based; `base` is the initial delay.
pub fn backoff_delay(base: Duration, multiplier: f64, attempt: u32, cap: Duration) -> Duration {
    let scaled = base.as_secs_f64() * multiplier.powi(attempt as i32);
    Duration::from_secs_f64(scaled).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_secs(5);
        let cap = Duration::from_secs(300);
        assert_eq!(backoff_delay(base, 1.5, 0, cap), Duration::from_secs(5));
        assert!(backoff_delay(base, 1.5, 1, cap) > base);
        assert_eq!(backoff_delay(base, 1.5, 100, cap), cap);
    }
}
