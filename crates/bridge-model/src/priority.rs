use serde::{Deserialize, Serialize};

/// Alert urgency. Lower numeric value is more urgent; ordering on the enum
/// itself follows declaration order so `AlertPriority::Critical <
/// AlertPriority::Info` holds directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertPriority {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl AlertPriority {
    /// Numeric value matching the specification's table (1 = most urgent).
    pub fn value(self) -> u8 {
        match self {
            AlertPriority::Critical => 1,
            AlertPriority::High => 2,
            AlertPriority::Medium => 3,
            AlertPriority::Low => 4,
            AlertPriority::Info => 5,
        }
    }

    /// One step less urgent, used by the queue's retry-demotion policy.
    /// `CRITICAL` never demotes; `INFO` is already the floor.
    pub fn demote(self) -> AlertPriority {
        match self {
            AlertPriority::Critical => AlertPriority::Critical,
            AlertPriority::High => AlertPriority::Medium,
            AlertPriority::Medium => AlertPriority::Low,
            AlertPriority::Low => AlertPriority::Info,
            AlertPriority::Info => AlertPriority::Info,
        }
    }

    /// The mesh-formatting prefix for this urgency level.
    pub fn mesh_prefix(self) -> &'static str {
        match self {
            AlertPriority::Critical => "[!!!]",
            AlertPriority::High => "[!!]",
            AlertPriority::Medium => "[!]",
            AlertPriority::Low => "[i]",
            AlertPriority::Info => "[.]",
        }
    }

    /// Lowercase metric label, e.g. for a Prometheus counter's `priority`
    /// dimension.
    pub fn label(self) -> &'static str {
        match self {
            AlertPriority::Critical => "critical",
            AlertPriority::High => "high",
            AlertPriority::Medium => "medium",
            AlertPriority::Low => "low",
            AlertPriority::Info => "info",
        }
    }
}

impl Default for AlertPriority {
    fn default() -> Self {
        AlertPriority::Medium
    }
}

/// Which transport(s) a message or alert is routed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    Mesh,
    Secure,
    Both,
}

/// Lifecycle of a single transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Sending,
    Delivered,
    Failed,
    Acknowledged,
}

/// Transport supervisor connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_by_urgency() {
        assert!(AlertPriority::Critical < AlertPriority::High);
        assert!(AlertPriority::High < AlertPriority::Info);
    }

    #[test]
    fn critical_never_demotes() {
        assert_eq!(AlertPriority::Critical.demote(), AlertPriority::Critical);
        assert_eq!(AlertPriority::High.demote(), AlertPriority::Medium);
        assert_eq!(AlertPriority::Info.demote(), AlertPriority::Info);
    }

    #[test]
    fn priority_serializes_as_name() {
        let json = serde_json::to_string(&AlertPriority::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }

    #[test]
    fn unknown_priority_name_is_rejected() {
        let err = serde_json::from_str::<AlertPriority>("\"URGENT\"");
        assert!(err.is_err());
    }
}
