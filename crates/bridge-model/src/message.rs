use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::priority::{AlertPriority, MessageStatus, Protocol};

/// A single transmission attempt unit owned by the durable outbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub destination: Option<String>,
    pub priority: AlertPriority,
    pub protocol: Protocol,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    /// Opaque key-value map. Core logic only ever inspects the two known
    /// keys `alert_id` and `escalation`; everything else passes through
    /// untouched.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl QueuedMessage {
    pub fn new(
        text: impl Into<String>,
        destination: Option<String>,
        priority: AlertPriority,
        protocol: Protocol,
        max_retries: u32,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            destination,
            priority,
            protocol,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            delivered_at: None,
            retry_count: 0,
            max_retries,
            metadata,
        }
    }

    /// The `alert_id` metadata key, if present.
    pub fn alert_id(&self) -> Option<String> {
        self.metadata
            .get("alert_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Whether this message carries the `escalation` metadata flag.
    pub fn is_escalation(&self) -> bool {
        self.metadata
            .get("escalation")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_known_metadata_keys() {
        let msg = QueuedMessage::new(
            "hello",
            None,
            AlertPriority::High,
            Protocol::Mesh,
            3,
            serde_json::json!({"alert_id": "abc", "escalation": true}),
        );
        assert_eq!(msg.alert_id(), Some("abc".to_string()));
        assert!(msg.is_escalation());
    }

    #[test]
    fn round_trips_through_json_with_enum_names() {
        let msg = QueuedMessage::new(
            "hello",
            Some("node-1".into()),
            AlertPriority::Low,
            Protocol::Secure,
            3,
            serde_json::json!({}),
        );
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(encoded.contains("\"LOW\""));
        assert!(encoded.contains("\"SECURE\""));
        assert!(encoded.contains("\"PENDING\""));
        let decoded: QueuedMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, msg.id);
        assert_eq!(decoded.priority, msg.priority);
    }
}
