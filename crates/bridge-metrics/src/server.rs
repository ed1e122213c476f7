use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type handed to every component that records metrics.
pub type SharedRegistry = Arc<Registry>;

/// Counters and gauges recorded across the bridge's components. Holds the
/// registry it was built against so a single handle can both be cloned into
/// supervisors and used to start the exporter.
#[derive(Clone)]
pub struct BridgeMetrics {
    registry: SharedRegistry,
    alerts_total: IntCounterVec,
    alerts_acknowledged_total: IntCounter,
    alerts_escalated_total: IntCounter,
    isp_failovers_total: IntCounter,
    relay_duplicates_total: IntCounter,
    relay_forwarded_total: IntCounterVec,
    queue_pending: IntGauge,
    queue_failed: IntGauge,
}

impl BridgeMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let alerts_total = IntCounterVec::new(
            Opts::new("meshbridge_alerts_total", "Alerts sent, labeled by priority"),
            &["priority"],
        )?;
        registry.register(Box::new(alerts_total.clone())).context("register alerts_total")?;

        let alerts_acknowledged_total = IntCounter::with_opts(Opts::new(
            "meshbridge_alerts_acknowledged_total",
            "Alerts acknowledged by an operator",
        ))?;
        registry
            .register(Box::new(alerts_acknowledged_total.clone()))
            .context("register alerts_acknowledged_total")?;

        let alerts_escalated_total = IntCounter::with_opts(Opts::new(
            "meshbridge_alerts_escalated_total",
            "Alerts escalated after exceeding their acknowledgment timeout",
        ))?;
        registry
            .register(Box::new(alerts_escalated_total.clone()))
            .context("register alerts_escalated_total")?;

        let isp_failovers_total = IntCounter::with_opts(Opts::new(
            "meshbridge_isp_failovers_total",
            "Transitions of the ISP connectivity monitor into failover",
        ))?;
        registry
            .register(Box::new(isp_failovers_total.clone()))
            .context("register isp_failovers_total")?;

        let relay_duplicates_total = IntCounter::with_opts(Opts::new(
            "meshbridge_relay_duplicates_total",
            "Inbound messages dropped by the relay as duplicates",
        ))?;
        registry
            .register(Box::new(relay_duplicates_total.clone()))
            .context("register relay_duplicates_total")?;

        let relay_forwarded_total = IntCounterVec::new(
            Opts::new("meshbridge_relay_forwarded_total", "Messages forwarded by the relay, labeled by direction"),
            &["direction"],
        )?;
        registry
            .register(Box::new(relay_forwarded_total.clone()))
            .context("register relay_forwarded_total")?;

        let queue_pending = IntGauge::with_opts(Opts::new(
            "meshbridge_queue_pending",
            "Messages currently pending in the outbound queue",
        ))?;
        registry.register(Box::new(queue_pending.clone())).context("register queue_pending")?;

        let queue_failed = IntGauge::with_opts(Opts::new(
            "meshbridge_queue_failed",
            "Messages that exhausted their retry budget",
        ))?;
        registry.register(Box::new(queue_failed.clone())).context("register queue_failed")?;

        Ok(Self {
            registry,
            alerts_total,
            alerts_acknowledged_total,
            alerts_escalated_total,
            isp_failovers_total,
            relay_duplicates_total,
            relay_forwarded_total,
            queue_pending,
            queue_failed,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_alert(&self, priority: &str) {
        self.alerts_total.with_label_values(&[priority]).inc();
    }

    pub fn record_acknowledged(&self) {
        self.alerts_acknowledged_total.inc();
    }

    pub fn record_escalated(&self) {
        self.alerts_escalated_total.inc();
    }

    pub fn record_isp_failover(&self) {
        self.isp_failovers_total.inc();
    }

    pub fn record_relay_duplicate(&self) {
        self.relay_duplicates_total.inc();
    }

    pub fn record_relay_forward(&self, direction: &str) {
        self.relay_forwarded_total.with_label_values(&[direction]).inc();
    }

    pub fn set_queue_depth(&self, pending: usize, failed: usize) {
        self.queue_pending.set(pending as i64);
        self.queue_failed.set(failed as i64);
    }
}

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes `metrics`'s registry at `/metrics`.
pub fn spawn_http_server(metrics: &BridgeMetrics, addr: SocketAddr) -> Result<MetricsServer> {
    let registry = metrics.registry();
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    std_listener
        .set_nonblocking(true)
        .context("failed to configure metrics listener as non-blocking")?;
    let listener = TcpListener::from_std(std_listener)
        .context("failed to convert std listener into tokio listener")?;

    info!(address = %addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_str(encoder.format_type()).expect("content type is valid header value"))],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, HeaderValue::from_str(encoder.format_type()).expect("content type is valid header value"))],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_conflict() {
        let registry: SharedRegistry = Arc::new(Registry::new());
        let metrics = BridgeMetrics::new(registry).unwrap();
        metrics.record_alert("critical");
        metrics.record_acknowledged();
        metrics.set_queue_depth(3, 1);
        let families = metrics.registry().gather();
        assert!(!families.is_empty());
    }
}
