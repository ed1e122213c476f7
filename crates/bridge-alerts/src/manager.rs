use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_connectivity::ConnectivityMonitor;
use bridge_metrics::BridgeMetrics;
use bridge_model::{Alert, AlertPriority, Protocol, RoutingRule};
use bridge_queue::DurableQueue;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::rules::default_routing_rules;
use crate::stats::AlertStats;

const ESCALATION_TICK_SECONDS: u64 = 30;

struct AlertSets {
    active: HashMap<Uuid, Alert>,
    escalated: HashMap<Uuid, Alert>,
    acknowledged: HashMap<Uuid, Alert>,
}

/// Owns the routing-rule table, alert lifecycle, escalation loop and the
/// connectivity monitor's failover reaction.
pub struct AlertManager {
    queue: Arc<DurableQueue>,
    connectivity: Arc<ConnectivityMonitor>,
    rules: RwLock<Vec<RoutingRule>>,
    alerts: Mutex<AlertSets>,
    total_alerts: AtomicU64,
    acknowledged_count: AtomicU64,
    escalated_count: AtomicU64,
    metrics: RwLock<Option<Arc<BridgeMetrics>>>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AlertManager {
    pub fn new(queue: Arc<DurableQueue>, connectivity: Arc<ConnectivityMonitor>) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            queue,
            connectivity,
            rules: RwLock::new(default_routing_rules()),
            alerts: Mutex::new(AlertSets {
                active: HashMap::new(),
                escalated: HashMap::new(),
                acknowledged: HashMap::new(),
            }),
            total_alerts: AtomicU64::new(0),
            acknowledged_count: AtomicU64::new(0),
            escalated_count: AtomicU64::new(0),
            metrics: RwLock::new(None),
            shutdown_tx,
            worker: Mutex::new(None),
        })
    }

    /// Attach a metrics handle so alert/acknowledgment/escalation/failover
    /// counters reach the shared registry. Optional; a manager with no
    /// metrics attached still functions, it just isn't observable.
    pub fn set_metrics(&self, metrics: Arc<BridgeMetrics>) {
        *self.metrics.write() = Some(metrics);
    }

    fn rule_for(&self, priority: AlertPriority) -> RoutingRule {
        self.rules
            .read()
            .iter()
            .find(|r| r.priority == priority)
            .cloned()
            .unwrap_or(RoutingRule {
                priority,
                protocol: Protocol::Mesh,
                escalation_timeout_seconds: 0,
                require_ack: false,
            })
    }

    pub fn update_routing_rule(
        &self,
        priority: AlertPriority,
        protocol: Option<Protocol>,
        escalation_timeout_seconds: Option<u64>,
        require_ack: Option<bool>,
    ) {
        let mut rules = self.rules.write();
        if let Some(rule) = rules.iter_mut().find(|r| r.priority == priority) {
            if let Some(protocol) = protocol {
                rule.protocol = protocol;
            }
            if let Some(timeout) = escalation_timeout_seconds {
                rule.escalation_timeout_seconds = timeout;
            }
            if let Some(require_ack) = require_ack {
                rule.require_ack = require_ack;
            }
        }
    }

    fn determine_protocol(&self, alert: &Alert) -> Protocol {
        let rule = self.rule_for(alert.priority);
        let mut protocol = rule.protocol;

        if self.connectivity.status().failover_active
            && matches!(alert.priority, AlertPriority::Critical | AlertPriority::High)
        {
            protocol = Protocol::Mesh;
            info!(alert_id = %alert.id, "isp down, routing via mesh");
        }

        protocol
    }

    pub fn send_alert(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: AlertPriority,
        source: impl Into<String>,
        category: impl Into<String>,
        target_nodes: Vec<String>,
        metadata: serde_json::Value,
    ) -> Uuid {
        let mut alert = Alert::new(
            title,
            message,
            priority,
            source,
            category,
            target_nodes.clone(),
            Protocol::Mesh,
            metadata,
        );
        let protocol = self.determine_protocol(&alert);
        alert.routing_protocol = protocol;
        let id = alert.id;
        let text = alert.to_mesh_message();

        self.alerts.lock().active.insert(id, alert);
        self.total_alerts.fetch_add(1, Ordering::Relaxed);

        self.queue.enqueue(
            text,
            target_nodes.into_iter().next(),
            priority,
            protocol,
            serde_json::json!({"alert_id": id.to_string()}),
        );

        if let Some(metrics) = self.metrics.read().as_ref() {
            metrics.record_alert(priority.label());
        }

        info!(alert_id = %id, ?protocol, "alert queued");
        id
    }

    pub fn acknowledge_alert(&self, alert_id: Uuid, acknowledged_by: impl Into<String>) -> bool {
        let acknowledged_by = acknowledged_by.into();
        let mut sets = self.alerts.lock();
        let mut alert = sets
            .active
            .remove(&alert_id)
            .or_else(|| sets.escalated.remove(&alert_id));
        let Some(alert) = alert.as_mut() else {
            return false;
        };
        alert.acknowledged = true;
        alert.acknowledged_by = Some(acknowledged_by.clone());
        alert.acknowledged_at = Some(Utc::now());
        sets.acknowledged.insert(alert_id, alert.clone());
        drop(sets);

        self.acknowledged_count.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = self.metrics.read().as_ref() {
            metrics.record_acknowledged();
        }
        info!(alert_id = %alert_id, acknowledged_by, "alert acknowledged");
        true
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().active.values().cloned().collect()
    }

    pub fn escalated_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().escalated.values().cloned().collect()
    }

    pub fn alert(&self, alert_id: Uuid) -> Option<Alert> {
        let sets = self.alerts.lock();
        sets.active
            .get(&alert_id)
            .or_else(|| sets.escalated.get(&alert_id))
            .or_else(|| sets.acknowledged.get(&alert_id))
            .cloned()
    }

    pub fn stats(&self) -> AlertStats {
        let sets = self.alerts.lock();
        AlertStats {
            total_alerts: self.total_alerts.load(Ordering::Relaxed),
            acknowledged: self.acknowledged_count.load(Ordering::Relaxed),
            escalated: self.escalated_count.load(Ordering::Relaxed),
            active_alerts: sets.active.len(),
            escalated_alerts: sets.escalated.len(),
            acknowledged_alerts: sets.acknowledged.len(),
        }
    }

    fn escalate(&self, alert_id: Uuid) {
        let mut sets = self.alerts.lock();
        let Some(mut alert) = sets.active.remove(&alert_id) else {
            return;
        };
        alert.escalated = true;
        alert.escalated_at = Some(Utc::now());
        let text = format!("[ESCALATION] {}", alert.to_mesh_message());
        sets.escalated.insert(alert_id, alert);
        drop(sets);

        self.escalated_count.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = self.metrics.read().as_ref() {
            metrics.record_escalated();
        }
        warn!(alert_id = %alert_id, "alert escalated, no acknowledgment");

        self.queue.enqueue(
            text,
            None,
            AlertPriority::Critical,
            Protocol::Both,
            serde_json::json!({"alert_id": alert_id.to_string(), "escalation": true}),
        );
    }

    fn check_escalations(&self) {
        let now = Utc::now();
        let due: Vec<Uuid> = {
            let sets = self.alerts.lock();
            sets.active
                .values()
                .filter(|alert| {
                    let rule = self.rule_for(alert.priority);
                    rule.escalation_timeout_seconds > 0
                        && (now - alert.created_at).num_seconds() as u64
                            >= rule.escalation_timeout_seconds
                })
                .map(|alert| alert.id)
                .collect()
        };
        for id in due {
            self.escalate(id);
        }
    }

    async fn on_isp_failover(&self, failover_active: bool) {
        if failover_active {
            if let Some(metrics) = self.metrics.read().as_ref() {
                metrics.record_isp_failover();
            }
            self.send_alert(
                "ISP Failover",
                "Internet connection lost. Routing via mesh network.",
                AlertPriority::High,
                "isp-monitor",
                "network",
                vec![],
                serde_json::json!({}),
            );
        } else {
            self.send_alert(
                "ISP Restored",
                "Internet connection restored. Resuming normal routing.",
                AlertPriority::Medium,
                "isp-monitor",
                "network",
                vec![],
                serde_json::json!({}),
            );
        }
    }

    pub async fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.connectivity
            .set_failover_handler(Arc::new(move |active: bool| {
                let this = Arc::clone(&this);
                async move { this.on_isp_failover(active).await }
            }));
        self.connectivity.start().await;

        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let interval = std::time::Duration::from_secs(ESCALATION_TICK_SECONDS);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        this.check_escalations();
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
        *self.worker.lock() = Some(handle);
        info!("alert manager started");
    }

    pub async fn stop(self: &Arc<Self>) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.await;
        }
        self.connectivity.stop().await;
        info!("alert manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_common::config::{AlertConfig, QueueConfig};
    use std::time::Duration;

    fn manager(dir: &std::path::Path) -> Arc<AlertManager> {
        let queue_config = QueueConfig {
            max_queue_size: 100,
            batch_size: 10,
            flush_interval: Duration::from_millis(20),
            persistence_path: dir.to_string_lossy().to_string(),
        };
        let queue = DurableQueue::new(queue_config, 3);
        let alert_config = AlertConfig {
            escalation_timeout: Duration::from_secs(300),
            max_retries: 3,
            isp_check_interval: Duration::from_secs(3600),
            isp_check_hosts: vec!["198.51.100.1".to_string()],
        };
        let connectivity = ConnectivityMonitor::new(&alert_config);
        AlertManager::new(queue, connectivity)
    }

    #[test]
    fn critical_routes_to_both_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let id = manager.send_alert(
            "disk",
            "full",
            AlertPriority::Critical,
            "test",
            "general",
            vec![],
            serde_json::json!({}),
        );
        let alert = manager.alert(id).unwrap();
        assert_eq!(alert.routing_protocol, Protocol::Both);
        assert_eq!(manager.active_alerts().len(), 1);
    }

    #[test]
    fn acknowledge_moves_alert_out_of_active() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let id = manager.send_alert(
            "disk",
            "full",
            AlertPriority::Medium,
            "test",
            "general",
            vec![],
            serde_json::json!({}),
        );
        assert!(manager.acknowledge_alert(id, "alice"));
        assert!(manager.active_alerts().is_empty());
        assert_eq!(manager.alert(id).unwrap().acknowledged_by, Some("alice".to_string()));
        assert!(!manager.acknowledge_alert(id, "bob"));
    }

    #[test]
    fn escalation_moves_overdue_alert_and_enqueues_critical_message() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.update_routing_rule(AlertPriority::Medium, None, Some(1), None);
        let id = manager.send_alert(
            "disk",
            "full",
            AlertPriority::Medium,
            "test",
            "general",
            vec![],
            serde_json::json!({}),
        );
        {
            let mut sets = manager.alerts.lock();
            let alert = sets.active.get_mut(&id).unwrap();
            alert.created_at = Utc::now() - chrono::Duration::seconds(2);
        }
        manager.check_escalations();
        assert!(manager.active_alerts().is_empty());
        assert_eq!(manager.escalated_alerts().len(), 1);
        assert_eq!(manager.stats().escalated, 1);
    }

    #[tokio::test]
    async fn isp_failover_transition_sends_high_priority_alert() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.on_isp_failover(true).await;
        let alerts = manager.active_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "ISP Failover");
        assert_eq!(alerts[0].priority, AlertPriority::High);
    }
}
