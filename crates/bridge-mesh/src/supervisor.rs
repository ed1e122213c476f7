use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_common::config::MeshConfig;
use bridge_model::{ConnectionState, DeliveryReceipt, Node, NodeUpdate};
use bridge_transport::{reconnect_with_backoff, ReconnectPolicy, Transport, TransportCounterSnapshot, TransportCounters};
use chrono::Duration as ChronoDuration;
use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::frame::{InboundFrame, OutboundFrame};

const CONNECTED_RECENCY: i64 = 3600;

type MessageCallback = Arc<dyn Fn(&str, Option<&str>, &str) + Send + Sync>;
type NodeCallback = Arc<dyn Fn(&Node) + Send + Sync>;
type ConnectionCallback = Arc<dyn Fn(bool, ConnectionState) + Send + Sync>;

/// Supervises the mesh (LoRa broadcast) device link: a reconnecting
/// newline-delimited-JSON TCP session, a catalog of nodes heard on the
/// network, and correlation of outbound sends with inbound acknowledgements.
pub struct MeshSupervisor {
    config: MeshConfig,
    state: SyncMutex<ConnectionState>,
    nodes: RwLock<HashMap<String, Node>>,
    pending: SyncMutex<HashMap<String, DeliveryReceipt>>,
    counters: TransportCounters,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    shutdown_tx: broadcast::Sender<()>,
    worker: SyncMutex<Option<JoinHandle<()>>>,
    message_callbacks: RwLock<Vec<MessageCallback>>,
    node_callbacks: RwLock<Vec<NodeCallback>>,
    connection_callbacks: RwLock<Vec<ConnectionCallback>>,
}

impl MeshSupervisor {
    pub fn new(config: MeshConfig) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            state: SyncMutex::new(ConnectionState::Disconnected),
            nodes: RwLock::new(HashMap::new()),
            pending: SyncMutex::new(HashMap::new()),
            counters: TransportCounters::default(),
            writer: AsyncMutex::new(None),
            shutdown_tx,
            worker: SyncMutex::new(None),
            message_callbacks: RwLock::new(Vec::new()),
            node_callbacks: RwLock::new(Vec::new()),
            connection_callbacks: RwLock::new(Vec::new()),
        })
    }

    pub fn register_message_callback(&self, cb: MessageCallback) {
        self.message_callbacks.write().push(cb);
    }

    pub fn register_node_callback(&self, cb: NodeCallback) {
        self.node_callbacks.write().push(cb);
    }

    pub fn register_connection_callback(&self, cb: ConnectionCallback) {
        self.connection_callbacks.write().push(cb);
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.read().values().cloned().collect()
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        self.nodes.read().get(id).cloned()
    }

    pub fn connected_nodes(&self) -> Vec<Node> {
        let recency = ChronoDuration::seconds(CONNECTED_RECENCY);
        self.nodes
            .read()
            .values()
            .filter(|n| n.is_connected(recency))
            .cloned()
            .collect()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    fn notify_connection(&self, connected: bool, state: ConnectionState) {
        for cb in self.connection_callbacks.read().iter() {
            cb(connected, state);
        }
    }

    fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: self.config.reconnect_delay,
            backoff_multiplier: self.config.reconnect_backoff_multiplier,
            max_delay: std::time::Duration::from_secs(300),
            max_attempts: self.config.max_reconnect_attempts,
        }
    }

    async fn connect_once(self: &Arc<Self>) -> bool {
        self.set_state(ConnectionState::Connecting);
        info!(device = %self.config.device_path, "connecting to mesh device");
        match TcpStream::connect(&self.config.device_path).await {
            Ok(stream) => {
                let (read_half, write_half) = stream.into_split();
                *self.writer.lock().await = Some(write_half);
                self.set_state(ConnectionState::Connected);
                info!("mesh device connected");
                self.notify_connection(true, ConnectionState::Connected);
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.read_loop(read_half).await;
                });
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to connect to mesh device");
                false
            }
        }
    }

    async fn read_loop(self: Arc<Self>, read_half: tokio::net::tcp::OwnedReadHalf) {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InboundFrame>(&line) {
                        Ok(frame) => self.handle_frame(frame),
                        Err(err) => warn!(error = %err, "malformed mesh frame"),
                    }
                }
                Ok(None) => {
                    warn!("mesh device link closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "mesh device read error");
                    break;
                }
            }
        }
        *self.writer.lock().await = None;
        if *self.state.lock() != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Reconnecting);
            self.notify_connection(false, ConnectionState::Reconnecting);
        }
    }

    fn handle_frame(&self, frame: InboundFrame) {
        self.counters.inc_received();

        if let Some(id) = &frame.ack_of {
            self.acknowledge(id, &frame.from_id);
        }

        let update = frame.node_update();
        let has_update = update.long_name.is_some()
            || update.short_name.is_some()
            || update.hardware_model.is_some()
            || update.snr.is_some()
            || update.rssi.is_some()
            || update.battery_level.is_some()
            || update.voltage.is_some()
            || update.position.is_some()
            || update.hops_away.is_some()
            || update.is_licensed.is_some()
            || update.role.is_some();
        if has_update || frame.text.is_some() {
            let node = self.update_node(&frame.from_id, &update);
            for cb in self.node_callbacks.read().iter() {
                cb(&node);
            }
        }

        if let Some(text) = &frame.text {
            if let Some(rest) = text.strip_prefix("ACK:") {
                self.acknowledge(rest.trim(), &frame.from_id);
            }
            for cb in self.message_callbacks.read().iter() {
                cb(&frame.from_id, frame.to_id.as_deref(), text);
            }
        }
    }

    fn update_node(&self, node_id: &str, update: &NodeUpdate) -> Node {
        let mut nodes = self.nodes.write();
        let node = nodes
            .entry(node_id.to_string())
            .or_insert_with(|| Node::new(node_id));
        node.merge_update(update);
        node.clone()
    }

    fn acknowledge(&self, message_id: &str, from_node: &str) {
        let mut pending = self.pending.lock();
        if let Some(receipt) = pending.get_mut(message_id) {
            receipt.acknowledged = true;
            receipt.acknowledged_at = Some(chrono::Utc::now());
            info!(id = message_id, from = from_node, "mesh message acknowledged");
        }
    }

    pub fn delivery_receipt(&self, message_id: &str) -> Option<DeliveryReceipt> {
        self.pending.lock().get(message_id).cloned()
    }

    pub async fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                if !this.connect_once().await {
                    this.set_state(ConnectionState::Reconnecting);
                    let policy = this.reconnect_policy();
                    let inner = Arc::clone(&this);
                    let ok = reconnect_with_backoff(&policy, &inner.counters, "mesh", || {
                        let inner = Arc::clone(&inner);
                        async move { inner.connect_once().await }
                    })
                    .await;
                    if !ok {
                        this.set_state(ConnectionState::Failed);
                        this.notify_connection(false, ConnectionState::Failed);
                        break;
                    }
                }
                if shutdown_rx.recv().await.is_ok() {
                    break;
                }
            }
        });
        *self.worker.lock() = Some(handle);
    }

    pub async fn stop(self: &Arc<Self>) {
        self.set_state(ConnectionState::Disconnected);
        let _ = self.shutdown_tx.send(());
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.disconnect().await;
    }
}

#[async_trait]
impl Transport for MeshSupervisor {
    async fn connect(&self) -> bool {
        self.set_state(ConnectionState::Connecting);
        match TcpStream::connect(&self.config.device_path).await {
            Ok(stream) => {
                let (_, write_half) = stream.into_split();
                *self.writer.lock().await = Some(write_half);
                self.set_state(ConnectionState::Connected);
                true
            }
            Err(_) => {
                self.set_state(ConnectionState::Failed);
                false
            }
        }
    }

    async fn disconnect(&self) {
        *self.writer.lock().await = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn send(
        &self,
        text: &str,
        destination: Option<&str>,
        want_ack: bool,
        channel_index: Option<u8>,
    ) -> Option<String> {
        if self.state() != ConnectionState::Connected {
            warn!("cannot send on mesh: not connected");
            return None;
        }
        let frame = OutboundFrame {
            text,
            to_id: destination,
            want_ack,
            channel_index: channel_index.unwrap_or(0),
        };
        let Ok(mut line) = serde_json::to_string(&frame) else {
            return None;
        };
        line.push('\n');

        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            self.counters.inc_failed();
            return None;
        };
        if stream.write_all(line.as_bytes()).await.is_err() {
            self.counters.inc_failed();
            return None;
        }
        drop(writer);

        let message_id = uuid::Uuid::new_v4().to_string();
        self.counters.inc_sent();
        if want_ack {
            let node_id = destination.unwrap_or("broadcast").to_string();
            self.pending
                .lock()
                .insert(message_id.clone(), DeliveryReceipt::new(message_id.clone(), node_id));
        }
        Some(message_id)
    }

    fn stats(&self) -> TransportCounterSnapshot {
        self.counters.snapshot()
    }

    fn name(&self) -> &'static str {
        "mesh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn test_config(device_path: String) -> MeshConfig {
        MeshConfig {
            device_path,
            reconnect_delay: Duration::from_millis(5),
            max_reconnect_attempts: 2,
            reconnect_backoff_multiplier: 1.0,
            message_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn connect_and_send_writes_expected_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            serde_json::from_slice::<serde_json::Value>(&buf[..n]).unwrap()["text"]
                .as_str()
                .unwrap()
                .to_string()
        });

        let supervisor = MeshSupervisor::new(test_config(addr.to_string()));
        assert!(supervisor.connect().await);
        let id = supervisor.send("hello mesh", None, true, None).await;
        assert!(id.is_some());
        let received_text = server.await.unwrap();
        assert_eq!(received_text, "hello mesh");
    }

    #[tokio::test]
    async fn native_ack_event_marks_receipt_acknowledged() {
        let supervisor = MeshSupervisor::new(test_config("127.0.0.1:0".into()));
        let message_id = "pending-1".to_string();
        supervisor
            .pending
            .lock()
            .insert(message_id.clone(), DeliveryReceipt::new(message_id.clone(), "!node1"));
        supervisor.handle_frame(InboundFrame {
            from_id: "!node1".into(),
            to_id: None,
            text: None,
            ack_of: Some(message_id.clone()),
            snr: None,
            rssi: None,
            user: None,
            position: None,
            device_metrics: None,
            hops_away: None,
        });
        assert!(supervisor.delivery_receipt(&message_id).unwrap().acknowledged);
    }

    #[test]
    fn node_catalog_merges_partial_updates() {
        let supervisor = MeshSupervisor::new(test_config("127.0.0.1:0".into()));
        let frame = InboundFrame {
            from_id: "!aaa111".into(),
            to_id: None,
            text: None,
            ack_of: None,
            snr: Some(5.5),
            rssi: None,
            user: None,
            position: None,
            device_metrics: None,
            hops_away: None,
        };
        supervisor.handle_frame(frame);
        let node = supervisor.node("!aaa111").unwrap();
        assert_eq!(node.snr, Some(5.5));
    }

    #[test]
    fn ack_prefixed_text_marks_receipt_acknowledged() {
        let supervisor = MeshSupervisor::new(test_config("127.0.0.1:0".into()));
        supervisor
            .pending
            .lock()
            .insert("msg-1".into(), DeliveryReceipt::new("msg-1", "!aaa111"));
        supervisor.handle_frame(InboundFrame {
            from_id: "!aaa111".into(),
            to_id: None,
            text: Some("ACK:msg-1".into()),
            ack_of: None,
            snr: None,
            rssi: None,
            user: None,
            position: None,
            device_metrics: None,
            hops_away: None,
        });
        assert!(supervisor.delivery_receipt("msg-1").unwrap().acknowledged);
    }
}
