use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the upstream internet connectivity state as observed by the
/// connectivity monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_online: bool,
    pub failover_active: bool,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_checks: u32,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub failover_triggered_at: Option<DateTime<Utc>>,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            is_online: true,
            failover_active: false,
            last_check: None,
            failed_checks: 0,
            latency_ms: None,
            failover_triggered_at: None,
        }
    }
}

/// An entry in the secure transport's address book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownDestination {
    pub hash: String,
    pub name: String,
    pub added: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
