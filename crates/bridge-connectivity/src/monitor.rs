use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bridge_common::config::AlertConfig;
use bridge_model::ConnectivityState;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::handler::FailoverHandler;
use crate::probe::{Prober, SystemPinger};

const FAILURE_THRESHOLD: u32 = 3;

/// Periodically probes upstream internet reachability and debounces
/// transitions before notifying a registered [`FailoverHandler`].
pub struct ConnectivityMonitor {
    hosts: Vec<String>,
    check_interval: std::time::Duration,
    prober: RwLock<Arc<dyn Prober>>,
    state: RwLock<ConnectivityState>,
    consecutive_failures: AtomicU32,
    handler: RwLock<Option<Arc<dyn FailoverHandler>>>,
    shutdown_tx: broadcast::Sender<()>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(config: &AlertConfig) -> Arc<Self> {
        Self::with_prober(config, Arc::new(SystemPinger))
    }

    pub fn with_prober(config: &AlertConfig, prober: Arc<dyn Prober>) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            hosts: config.isp_check_hosts.clone(),
            check_interval: config.isp_check_interval,
            prober: RwLock::new(prober),
            state: RwLock::new(ConnectivityState::default()),
            consecutive_failures: AtomicU32::new(0),
            handler: RwLock::new(None),
            shutdown_tx,
            worker: parking_lot::Mutex::new(None),
        })
    }

    pub fn set_prober(&self, prober: Arc<dyn Prober>) {
        *self.prober.write() = prober;
    }

    pub fn set_failover_handler(&self, handler: Arc<dyn FailoverHandler>) {
        *self.handler.write() = Some(handler);
    }

    pub fn status(&self) -> ConnectivityState {
        self.state.read().clone()
    }

    pub async fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.check_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        this.check_connectivity().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
        *self.worker.lock() = Some(handle);
        info!("connectivity monitor started");
    }

    pub async fn stop(self: &Arc<Self>) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.await;
        }
        info!("connectivity monitor stopped");
    }

    async fn check_connectivity(&self) {
        let prober = self.prober.read().clone();
        let mut reached = None;
        for host in &self.hosts {
            let result = prober.probe(host).await;
            if result.reachable {
                reached = Some(result);
                break;
            }
        }

        let mut state = self.state.write();
        state.last_check = Some(Utc::now());

        if let Some(result) = reached {
            state.latency_ms = result.latency_ms;
            self.consecutive_failures.store(0, Ordering::Relaxed);
            state.failed_checks = 0;

            if state.failover_active {
                state.failover_active = false;
                state.is_online = true;
                drop(state);
                info!("ISP connectivity restored");
                self.notify(false).await;
            }
        } else {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            state.failed_checks = failures;

            if failures >= FAILURE_THRESHOLD && !state.failover_active {
                state.failover_active = true;
                state.is_online = false;
                state.failover_triggered_at = Some(Utc::now());
                drop(state);
                warn!("ISP failover triggered, routing via mesh");
                self.notify(true).await;
            }
        }
    }

    async fn notify(&self, active: bool) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler.on_failover(active).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn config(hosts: &[&str]) -> AlertConfig {
        AlertConfig {
            escalation_timeout: Duration::from_secs(300),
            max_retries: 3,
            isp_check_interval: Duration::from_millis(10),
            isp_check_hosts: hosts.iter().map(|s| s.to_string()).collect(),
        }
    }

    struct AlwaysUnreachable;
    #[async_trait::async_trait]
    impl Prober for AlwaysUnreachable {
        async fn probe(&self, _host: &str) -> crate::probe::ProbeResult {
            crate::probe::ProbeResult { reachable: false, latency_ms: None }
        }
    }

    struct AlwaysReachable;
    #[async_trait::async_trait]
    impl Prober for AlwaysReachable {
        async fn probe(&self, _host: &str) -> crate::probe::ProbeResult {
            crate::probe::ProbeResult { reachable: true, latency_ms: Some(11.0) }
        }
    }

    #[tokio::test]
    async fn unreachable_host_trips_failover_after_threshold() {
        let monitor = ConnectivityMonitor::with_prober(&config(&["198.51.100.1"]), Arc::new(AlwaysUnreachable));
        let calls = Arc::new(AtomicUsize::new(0));
        let c2 = calls.clone();
        monitor.set_failover_handler(Arc::new(move |_active: bool| {
            let c = c2.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));
        for _ in 0..FAILURE_THRESHOLD {
            monitor.check_connectivity().await;
        }
        assert!(monitor.status().failover_active);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovery_after_failover_resets_state_and_notifies_once() {
        let monitor = ConnectivityMonitor::with_prober(&config(&["198.51.100.1"]), Arc::new(AlwaysUnreachable));
        for _ in 0..FAILURE_THRESHOLD {
            monitor.check_connectivity().await;
        }
        assert!(monitor.status().failover_active);

        let calls = Arc::new(AtomicUsize::new(0));
        let c2 = calls.clone();
        monitor.set_failover_handler(Arc::new(move |active: bool| {
            let c = c2.clone();
            async move {
                assert!(!active);
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));
        monitor.set_prober(Arc::new(AlwaysReachable));
        monitor.check_connectivity().await;
        assert!(!monitor.status().failover_active);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
