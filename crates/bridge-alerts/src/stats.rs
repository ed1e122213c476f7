use serde::{Deserialize, Serialize};

/// Running counters surfaced by `AlertManager::stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertStats {
    pub total_alerts: u64,
    pub acknowledged: u64,
    pub escalated: u64,
    pub active_alerts: usize,
    pub escalated_alerts: usize,
    pub acknowledged_alerts: usize,
}
