use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bridge_alerts::AlertManager;
use bridge_api::{ApiBuilder, AppState, StaticApiKeyAuthoriser};
use bridge_common::config::BridgeConfig;
use bridge_common::logging::init_tracing;
use bridge_connectivity::ConnectivityMonitor;
use bridge_mesh::MeshSupervisor;
use bridge_metrics::{new_registry, spawn_http_server, BridgeMetrics};
use bridge_model::{Protocol, QueuedMessage};
use bridge_queue::{DurableQueue, SendHandler};
use bridge_relay::MessageRelay;
use bridge_secure::SecureSupervisor;
use bridge_transport::Transport;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Mesh Bridge alerting gateway daemon", long_about = None)]
struct Cli {}

/// Dispatches a dequeued message to one or both radio transports.
///
/// For `Protocol::Both` the Python original counted `sent_via_mesh` and
/// `sent_via_nomadnet` independently and considered the send a success if
/// either succeeded; this mirrors that by OR-ing the two outcomes rather
/// than requiring both transports to accept the packet.
struct BridgeSendHandler {
    mesh: Arc<MeshSupervisor>,
    secure: Arc<SecureSupervisor>,
}

#[async_trait]
impl SendHandler for BridgeSendHandler {
    async fn send(&self, message: &QueuedMessage) -> bool {
        let mut sent_via_mesh = false;
        let mut sent_via_secure = false;

        if matches!(message.protocol, Protocol::Mesh | Protocol::Both) {
            let result = self
                .mesh
                .send(&message.text, message.destination.as_deref(), true, None)
                .await;
            sent_via_mesh = result.is_some();
        }
        if matches!(message.protocol, Protocol::Secure | Protocol::Both) {
            if let Some(destination) = message.destination.as_deref() {
                let result = self.secure.send(&message.text, Some(destination), false, None).await;
                sent_via_secure = result.is_some();
            } else {
                warn!(id = %message.id, "secure routing requested without a destination; dropping");
            }
        }

        match message.protocol {
            Protocol::Mesh => sent_via_mesh,
            Protocol::Secure => sent_via_secure,
            Protocol::Both => sent_via_mesh || sent_via_secure,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _cli = Cli::parse();
    let config = BridgeConfig::from_env()?;
    init_tracing("meshbridged", &config.logging)?;

    let registry = new_registry();
    let metrics = Arc::new(BridgeMetrics::new(registry.clone())?);

    let queue = DurableQueue::new(config.queue.clone(), config.alerts.max_retries);
    let mesh = MeshSupervisor::new(config.mesh.clone());
    let secure = SecureSupervisor::new(config.secure.clone())?;
    let connectivity = ConnectivityMonitor::new(&config.alerts);
    let relay = Arc::new(MessageRelay::new(mesh.clone(), secure.clone()));
    let alerts = AlertManager::new(queue.clone(), connectivity.clone());

    queue.set_metrics(metrics.clone());
    relay.set_metrics(metrics.clone());
    alerts.set_metrics(metrics.clone());

    queue.set_send_handler(Arc::new(BridgeSendHandler {
        mesh: mesh.clone(),
        secure: secure.clone(),
    }));

    {
        let relay = relay.clone();
        mesh.register_message_callback(Arc::new(move |source, destination, text| {
            let relay = relay.clone();
            let source = source.to_string();
            let destination = destination.map(|d| d.to_string());
            let text = text.to_string();
            tokio::spawn(async move {
                relay.relay_from_mesh(&source, &text, destination.as_deref()).await;
            });
        }));
    }
    {
        let relay = relay.clone();
        secure.register_message_callback(Arc::new(move |message| {
            let relay = relay.clone();
            let source = message.source.clone();
            let text = message.content.clone();
            tokio::spawn(async move {
                relay.relay_from_secure(&source, &text, None).await;
            });
        }));
    }

    queue.start().await?;
    mesh.start().await;
    secure.start().await;
    alerts.start().await;

    let authoriser = StaticApiKeyAuthoriser::new(config.http.api_keys.clone());
    let ready = Arc::new(AtomicBool::new(false));

    let api_listen: SocketAddr = config.http.listen.parse()?;
    let api_state = AppState {
        queue: queue.clone(),
        mesh: mesh.clone(),
        secure: secure.clone(),
        connectivity: connectivity.clone(),
        relay: relay.clone(),
        alerts: alerts.clone(),
        registry: registry.clone(),
        authoriser,
        ready: ready.clone(),
    };
    let api_handle = ApiBuilder::new(api_listen, api_state).spawn().await?;
    info!(address = %api_handle.local_addr(), "mesh bridge api listening");

    let metrics_listen: SocketAddr = config.http.metrics_listen.parse()?;
    let metrics_handle = spawn_http_server(&metrics, metrics_listen)?;
    info!(address = %metrics_handle.addr(), "metrics exporter listening");

    ready.store(true, Ordering::Relaxed);
    info!("mesh bridge running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    ready.store(false, Ordering::Relaxed);
    api_handle.shutdown().await?;
    metrics_handle.shutdown().await?;
    alerts.stop().await;
    secure.stop().await;
    mesh.stop().await;
    queue.stop().await?;

    Ok(())
}
