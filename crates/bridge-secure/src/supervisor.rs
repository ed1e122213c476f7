use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bridge_common::config::SecureConfig;
use bridge_model::{ConnectionState, KnownDestination};
use bridge_transport::{Transport, TransportCounterSnapshot, TransportCounters};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::directory;
use crate::identity::Identity;
use crate::message::{self, SecureMessage};

const MAX_STORED_MESSAGES: usize = 500;

type MessageCallback = Arc<dyn Fn(&SecureMessage) + Send + Sync>;

/// Supervises the secure (store-and-forward) transport: a long-lived
/// keypair identity, an announce loop, a directory of known destinations,
/// and a bounded log of inbound deliveries.
pub struct SecureSupervisor {
    config: SecureConfig,
    identity: Identity,
    state: Mutex<ConnectionState>,
    known_destinations: RwLock<HashMap<String, KnownDestination>>,
    stored_messages: RwLock<VecDeque<SecureMessage>>,
    outbound_messages: RwLock<VecDeque<SecureMessage>>,
    counters: TransportCounters,
    announces_sent: std::sync::atomic::AtomicU64,
    message_callbacks: RwLock<Vec<MessageCallback>>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SecureSupervisor {
    pub fn new(config: SecureConfig) -> anyhow::Result<Arc<Self>> {
        let identity = Identity::load_or_create(config.identity_path.as_deref())?;
        info!(address = %identity.address, "secure transport identity ready");
        let known_destinations = directory::load(&config.storage_path).unwrap_or_default();
        let stored_messages = message::load(&config.storage_path).unwrap_or_default();
        let outbound_messages = message::load_outbound(&config.storage_path).unwrap_or_default();
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Arc::new(Self {
            config,
            identity,
            state: Mutex::new(ConnectionState::Disconnected),
            known_destinations: RwLock::new(known_destinations),
            stored_messages: RwLock::new(stored_messages),
            outbound_messages: RwLock::new(outbound_messages),
            counters: TransportCounters::default(),
            announces_sent: std::sync::atomic::AtomicU64::new(0),
            message_callbacks: RwLock::new(Vec::new()),
            shutdown_tx,
            worker: Mutex::new(None),
        }))
    }

    pub fn address(&self) -> &str {
        &self.identity.address
    }

    pub fn register_message_callback(&self, cb: MessageCallback) {
        self.message_callbacks.write().push(cb);
    }

    pub fn add_known_destination(&self, hash: impl Into<String>, name: impl Into<String>, metadata: serde_json::Value) {
        let hash = hash.into();
        self.known_destinations.write().insert(
            hash.clone(),
            KnownDestination {
                hash,
                name: name.into(),
                added: Utc::now(),
                metadata,
            },
        );
    }

    pub fn known_destinations(&self) -> Vec<KnownDestination> {
        self.known_destinations.read().values().cloned().collect()
    }

    /// Most recent stored inbound messages first.
    pub fn get_stored_messages(&self, limit: usize) -> Vec<SecureMessage> {
        self.stored_messages.read().iter().rev().take(limit).cloned().collect()
    }

    /// Most recent outbound deliveries this node constructed, newest first.
    pub fn get_outbound_messages(&self, limit: usize) -> Vec<SecureMessage> {
        self.outbound_messages.read().iter().rev().take(limit).cloned().collect()
    }

    /// Record an inbound delivery. Wiring the real Reticulum/LXMF receive
    /// path into this call is out of scope here; this is the seam a lower
    /// transport layer would call into.
    pub fn ingest_inbound(&self, message: SecureMessage) {
        self.counters.inc_received();
        {
            let mut stored = self.stored_messages.write();
            stored.push_back(message.clone());
            while stored.len() > MAX_STORED_MESSAGES {
                stored.pop_front();
            }
        }
        for cb in self.message_callbacks.read().iter() {
            cb(&message);
        }
    }

    fn send_message(&self, destination: &str, content: &str, title: &str, fields: serde_json::Value) -> bool {
        if self.state() != ConnectionState::Connected {
            warn!("cannot send on secure transport: not connected");
            return false;
        }
        if destination.is_empty() {
            warn!("secure send requires a destination");
            return false;
        }
        debug!(destination, title, "queued secure message for delivery");
        let message = SecureMessage::new(self.address(), destination, title, content, fields);
        {
            let mut outbound = self.outbound_messages.write();
            outbound.push_back(message);
            while outbound.len() > MAX_STORED_MESSAGES {
                outbound.pop_front();
            }
        }
        self.counters.inc_sent();
        true
    }

    pub async fn share_file(&self, destination: &str, path: &str, description: Option<&str>) -> bool {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(err) => {
                warn!(path, error = %err, "file not found for secure share");
                return false;
            }
        };
        let file_name = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        let file_hash = hex::encode(Sha256::digest(&data));
        let fields = serde_json::json!({
            "file_name": file_name,
            "file_size": data.len(),
            "file_hash": file_hash,
            "file_data": BASE64.encode(&data),
            "description": description.unwrap_or(""),
        });
        self.send_message(destination, &format!("File: {file_name}"), "File Transfer", fields)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    pub async fn start(self: &Arc<Self>) {
        self.set_state(ConnectionState::Connected);
        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.config.announce_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        this.announces_sent.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        debug!(address = %this.identity.address, "sent network announce");
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
        *self.worker.lock() = Some(handle);
        info!(address = %self.identity.address, "secure transport started");
    }

    pub async fn stop(self: &Arc<Self>) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.await;
        }
        self.set_state(ConnectionState::Disconnected);
        if let Err(err) = message::save(&self.config.storage_path, &self.stored_messages.read()) {
            warn!(error = %err, "failed to persist secure message log");
        }
        if let Err(err) = message::save_outbound(&self.config.storage_path, &self.outbound_messages.read()) {
            warn!(error = %err, "failed to persist secure outbound log");
        }
        if let Err(err) = directory::save(&self.config.storage_path, &self.known_destinations.read()) {
            warn!(error = %err, "failed to persist known destinations");
        }
        info!("secure transport stopped");
    }
}

#[async_trait]
impl Transport for SecureSupervisor {
    async fn connect(&self) -> bool {
        if let Err(err) = std::fs::create_dir_all(&self.config.storage_path) {
            warn!(error = %err, "failed to create secure storage directory");
            self.set_state(ConnectionState::Failed);
            return false;
        }
        self.set_state(ConnectionState::Connected);
        true
    }

    async fn disconnect(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn send(
        &self,
        text: &str,
        destination: Option<&str>,
        _want_ack: bool,
        _channel_index: Option<u8>,
    ) -> Option<String> {
        let destination = destination?;
        if self.send_message(destination, text, "", serde_json::json!({})) {
            Some(uuid::Uuid::new_v4().to_string())
        } else {
            None
        }
    }

    fn stats(&self) -> TransportCounterSnapshot {
        self.counters.snapshot()
    }

    fn name(&self) -> &'static str {
        "secure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_config(dir: &std::path::Path) -> SecureConfig {
        SecureConfig {
            identity_path: Some(dir.join("identity.key").to_string_lossy().to_string()),
            storage_path: dir.to_string_lossy().to_string(),
            announce_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn send_requires_destination() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = SecureSupervisor::new(test_config(dir.path())).unwrap();
        assert!(supervisor.connect().await);
        assert!(supervisor.send("hi", None, false, None).await.is_none());
        assert!(supervisor.send("hi", Some("abc123"), false, None).await.is_some());
    }

    #[tokio::test]
    async fn inbound_log_is_bounded_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = SecureSupervisor::new(test_config(dir.path())).unwrap();
        for i in 0..5 {
            supervisor.ingest_inbound(SecureMessage::new(
                "peer",
                supervisor.address(),
                "",
                format!("message {i}"),
                serde_json::json!({}),
            ));
        }
        let recent = supervisor.get_stored_messages(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "message 4");
    }

    #[tokio::test]
    async fn sent_messages_are_retrievable_as_outbound() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = SecureSupervisor::new(test_config(dir.path())).unwrap();
        assert!(supervisor.connect().await);
        assert!(supervisor.send("hello there", Some("abc123"), false, None).await.is_some());
        let outbound = supervisor.get_outbound_messages(10);
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].destination, "abc123");
        assert_eq!(outbound[0].content, "hello there");
    }

    #[tokio::test]
    async fn announce_loop_increments_counter() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = SecureSupervisor::new(test_config(dir.path())).unwrap();
        supervisor.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        supervisor.stop().await;
        assert!(supervisor.announces_sent.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn message_callbacks_fire_on_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = SecureSupervisor::new(test_config(dir.path())).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        supervisor.register_message_callback(Arc::new(move |_m: &SecureMessage| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        supervisor.ingest_inbound(SecureMessage::new("peer", supervisor.address(), "", "hi", serde_json::json!({})));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
