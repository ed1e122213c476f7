use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_metrics::BridgeMetrics;
use bridge_transport::Transport;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::stats::RelayStats;

const DEDUP_HASH_LEN: usize = 16;
const HISTORY_MAX: usize = 1000;

struct History {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl History {
    fn new() -> Self {
        Self { order: VecDeque::new(), seen: HashSet::new() }
    }

    /// Returns true if `hash` was already present; otherwise records it.
    fn check_and_insert(&mut self, hash: String) -> bool {
        if self.seen.contains(&hash) {
            return true;
        }
        self.seen.insert(hash.clone());
        self.order.push_back(hash);
        while self.order.len() > HISTORY_MAX {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        false
    }
}

/// Relays messages between the mesh and secure transports: dedup by content
/// hash, then route by explicit prefix or the node-mapping directory.
pub struct MessageRelay {
    mesh: Arc<dyn Transport>,
    secure: Arc<dyn Transport>,
    node_mapping: RwLock<HashMap<String, String>>,
    history: Mutex<History>,
    mesh_to_secure: AtomicU64,
    secure_to_mesh: AtomicU64,
    duplicates_dropped: AtomicU64,
    metrics: RwLock<Option<Arc<BridgeMetrics>>>,
}

impl MessageRelay {
    pub fn new(mesh: Arc<dyn Transport>, secure: Arc<dyn Transport>) -> Self {
        Self {
            mesh,
            secure,
            node_mapping: RwLock::new(HashMap::new()),
            history: Mutex::new(History::new()),
            mesh_to_secure: AtomicU64::new(0),
            secure_to_mesh: AtomicU64::new(0),
            duplicates_dropped: AtomicU64::new(0),
            metrics: RwLock::new(None),
        }
    }

    /// Attach a metrics handle so relay activity (forwards, duplicates
    /// dropped) is observable on `/metrics`. Optional.
    pub fn set_metrics(&self, metrics: Arc<BridgeMetrics>) {
        *self.metrics.write() = Some(metrics);
    }

    pub fn add_node_mapping(&self, mesh_node_id: impl Into<String>, secure_hash: impl Into<String>) {
        self.node_mapping.write().insert(mesh_node_id.into(), secure_hash.into());
    }

    pub fn secure_for_node(&self, mesh_node_id: &str) -> Option<String> {
        self.node_mapping.read().get(mesh_node_id).cloned()
    }

    fn mesh_for_secure(&self, secure_hash: &str) -> Option<String> {
        self.node_mapping
            .read()
            .iter()
            .find(|(_, v)| v.as_str() == secure_hash)
            .map(|(k, _)| k.clone())
    }

    fn dedup_hash(source: &str, text: &str) -> String {
        let digest = Sha256::digest(format!("{source}:{text}").as_bytes());
        hex::encode(&digest[..DEDUP_HASH_LEN / 2])
    }

    fn is_duplicate(&self, source: &str, text: &str) -> bool {
        let hash = Self::dedup_hash(source, text);
        self.history.lock().check_and_insert(hash)
    }

    /// Relay an inbound mesh message to the secure transport. Returns false
    /// (and drops) on duplicates or when no destination can be resolved.
    pub async fn relay_from_mesh(&self, source_node: &str, message: &str, target_secure: Option<&str>) -> bool {
        if self.is_duplicate(source_node, message) {
            self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = self.metrics.read().as_ref() {
                metrics.record_relay_duplicate();
            }
            return false;
        }

        let body = message.strip_prefix("N:").map(str::trim).unwrap_or(message);
        let target = target_secure.map(str::to_string).or_else(|| self.secure_for_node(source_node));
        let Some(target) = target else {
            debug!(source_node, "no secure destination for mesh relay");
            return false;
        };

        let text = format!("From Mesh: {source_node}: {body}");
        let sent = self.secure.send(&text, Some(&target), false, None).await.is_some();
        if sent {
            self.mesh_to_secure.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = self.metrics.read().as_ref() {
                metrics.record_relay_forward("mesh_to_secure");
            }
        }
        sent
    }

    /// Relay an inbound secure message to the mesh transport. Broadcasts
    /// when no reverse mapping is found for `source_hash`.
    pub async fn relay_from_secure(&self, source_hash: &str, message: &str, target_mesh: Option<&str>) -> bool {
        if self.is_duplicate(source_hash, message) {
            self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = self.metrics.read().as_ref() {
                metrics.record_relay_duplicate();
            }
            return false;
        }

        let body = message.strip_prefix("M:").map(str::trim).unwrap_or(message);
        let target = target_mesh
            .map(str::to_string)
            .or_else(|| self.mesh_for_secure(source_hash));

        let text = format!("[Secure] {body}");
        let sent = self.mesh.send(&text, target.as_deref(), false, None).await.is_some();
        if sent {
            self.secure_to_mesh.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = self.metrics.read().as_ref() {
                metrics.record_relay_forward("secure_to_mesh");
            }
        }
        sent
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            mesh_to_secure: self.mesh_to_secure.load(Ordering::Relaxed),
            secure_to_mesh: self.secure_to_mesh.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            active_mappings: self.node_mapping.read().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_model::ConnectionState;
    use bridge_transport::TransportCounterSnapshot;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeTransport {
        name: &'static str,
        last_sent: AsyncMutex<Option<(String, Option<String>)>>,
        fail: AtomicBool,
    }

    impl FakeTransport {
        fn new(name: &'static str) -> Self {
            Self { name, last_sent: AsyncMutex::new(None), fail: AtomicBool::new(false) }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn connect(&self) -> bool {
            true
        }
        async fn disconnect(&self) {}
        fn state(&self) -> ConnectionState {
            ConnectionState::Connected
        }
        async fn send(&self, text: &str, destination: Option<&str>, _want_ack: bool, _channel_index: Option<u8>) -> Option<String> {
            if self.fail.load(Ordering::SeqCst) {
                return None;
            }
            *self.last_sent.lock().await = Some((text.to_string(), destination.map(str::to_string)));
            Some("msg-1".to_string())
        }
        fn stats(&self) -> TransportCounterSnapshot {
            TransportCounterSnapshot::default()
        }
        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn relay() -> (MessageRelay, Arc<FakeTransport>, Arc<FakeTransport>) {
        let mesh = Arc::new(FakeTransport::new("mesh"));
        let secure = Arc::new(FakeTransport::new("secure"));
        (MessageRelay::new(mesh.clone(), secure.clone()), mesh, secure)
    }

    #[tokio::test]
    async fn duplicate_messages_are_dropped() {
        let (relay, _mesh, secure) = relay();
        relay.add_node_mapping("!node1", "abc123");
        assert!(relay.relay_from_mesh("!node1", "hello", None).await);
        assert!(!relay.relay_from_mesh("!node1", "hello", None).await);
        assert_eq!(relay.stats().duplicates_dropped, 1);
        assert_eq!(secure.last_sent.lock().await.as_ref().unwrap().1, Some("abc123".to_string()));
    }

    #[tokio::test]
    async fn mesh_relay_without_mapping_is_dropped() {
        let (relay, _mesh, _secure) = relay();
        assert!(!relay.relay_from_mesh("!unknown", "hi", None).await);
        assert_eq!(relay.stats().mesh_to_secure, 0);
    }

    #[tokio::test]
    async fn secure_relay_without_mapping_broadcasts_to_mesh() {
        let (relay, mesh, _secure) = relay();
        assert!(relay.relay_from_secure("abc123", "hi there", None).await);
        let sent = mesh.last_sent.lock().await.clone().unwrap();
        assert_eq!(sent.1, None);
        assert_eq!(sent.0, "[Secure] hi there");
    }

    #[tokio::test]
    async fn explicit_prefix_strips_before_forwarding() {
        let (relay, mesh, _secure) = relay();
        assert!(relay.relay_from_secure("abc123", "M:direct to node", Some("!node9")).await);
        let sent = mesh.last_sent.lock().await.clone().unwrap();
        assert_eq!(sent.0, "[Secure] direct to node");
        assert_eq!(sent.1, Some("!node9".to_string()));
    }
}
