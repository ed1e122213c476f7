use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::priority::{AlertPriority, Protocol};

/// Maximum mesh payload size (bytes) after formatting, per the specification.
pub const MAX_MESH_PAYLOAD_BYTES: usize = 220;

/// A logical notification accepted from an upstream caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub priority: AlertPriority,
    pub source: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub target_nodes: Vec<String>,
    pub routing_protocol: Protocol,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub escalated: bool,
    #[serde(default)]
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Alert {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        priority: AlertPriority,
        source: impl Into<String>,
        category: impl Into<String>,
        target_nodes: Vec<String>,
        routing_protocol: Protocol,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            message: message.into(),
            priority,
            source: source.into(),
            category: category.into(),
            created_at: Utc::now(),
            target_nodes,
            routing_protocol,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            escalated: false,
            escalated_at: None,
            metadata,
        }
    }

    /// Render `"<prefix> <title>: <message>"`, truncating `message` with a
    /// trailing ellipsis so the combined payload never exceeds
    /// [`MAX_MESH_PAYLOAD_BYTES`].
    pub fn to_mesh_message(&self) -> String {
        let prefix = self.priority.mesh_prefix();
        let head = format!("{prefix} {}: ", self.title);
        let budget = MAX_MESH_PAYLOAD_BYTES.saturating_sub(head.len());
        let message = if self.message.len() > budget {
            let mut truncated = self.message.as_bytes()[..budget.saturating_sub(1)].to_vec();
            while std::str::from_utf8(&truncated).is_err() {
                truncated.pop();
            }
            format!("{}…", String::from_utf8_lossy(&truncated))
        } else {
            self.message.clone()
        };
        format!("{head}{message}")
    }
}

/// Routing policy for a single priority level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub priority: AlertPriority,
    pub protocol: Protocol,
    pub escalation_timeout_seconds: u64,
    pub require_ack: bool,
}
