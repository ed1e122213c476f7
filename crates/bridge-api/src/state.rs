use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bridge_alerts::AlertManager;
use bridge_connectivity::ConnectivityMonitor;
use bridge_mesh::MeshSupervisor;
use bridge_metrics::SharedRegistry;
use bridge_queue::DurableQueue;
use bridge_relay::MessageRelay;
use bridge_secure::SecureSupervisor;

use crate::auth::StaticApiKeyAuthoriser;

/// Handles to every long-lived component the HTTP surface reads from or
/// drives. Constructed once by the composition root after all components
/// have been wired together.
pub struct AppState {
    pub queue: Arc<DurableQueue>,
    pub mesh: Arc<MeshSupervisor>,
    pub secure: Arc<SecureSupervisor>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub relay: Arc<MessageRelay>,
    pub alerts: Arc<AlertManager>,
    pub registry: SharedRegistry,
    pub authoriser: StaticApiKeyAuthoriser,
    pub ready: Arc<AtomicBool>,
}
