use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_common::config::QueueConfig;
use bridge_metrics::BridgeMetrics;
use bridge_model::{AlertPriority, MessageStatus, Protocol, QueuedMessage};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::handler::SendHandler;
use crate::persistence::{self, PersistedQueue};
use crate::priority_queue::PriorityQueue;
use crate::stats::QueueStats;

/// Number of mutations between periodic persistence snapshots, independent
/// of the flush on `stop()`.
const PERSIST_EVERY: u64 = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub failed: usize,
    pub sent: usize,
    pub stats: QueueStats,
}

struct Maps {
    sent: HashMap<Uuid, QueuedMessage>,
    failed: HashMap<Uuid, QueuedMessage>,
}

/// Crash-safe, priority-ordered outbound queue. Owns the priority heap and
/// drives a single-consumer send worker; `enqueue` may be called from any
/// task.
pub struct DurableQueue {
    config: QueueConfig,
    default_max_retries: u32,
    queue: PriorityQueue,
    maps: Mutex<Maps>,
    stats: Mutex<QueueStats>,
    send_handler: RwLock<Option<Arc<dyn SendHandler>>>,
    metrics: RwLock<Option<Arc<BridgeMetrics>>>,
    modifications: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DurableQueue {
    pub fn new(config: QueueConfig, default_max_retries: u32) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            default_max_retries,
            queue: PriorityQueue::new(),
            maps: Mutex::new(Maps {
                sent: HashMap::new(),
                failed: HashMap::new(),
            }),
            stats: Mutex::new(QueueStats::default()),
            send_handler: RwLock::new(None),
            metrics: RwLock::new(None),
            modifications: AtomicU64::new(0),
            worker: Mutex::new(None),
            shutdown_tx,
        })
    }

    pub fn set_send_handler(&self, handler: Arc<dyn SendHandler>) {
        *self.send_handler.write() = Some(handler);
    }

    /// Attach a metrics handle so queue depth is observable on `/metrics`.
    /// Optional; a queue with no metrics attached still functions.
    pub fn set_metrics(&self, metrics: Arc<BridgeMetrics>) {
        *self.metrics.write() = Some(metrics);
    }

    fn report_queue_depth(&self) {
        if let Some(metrics) = self.metrics.read().as_ref() {
            metrics.set_queue_depth(self.queue.size(), self.maps.lock().failed.len());
        }
    }

    fn persistence_dir(&self) -> PathBuf {
        persistence::default_persistence_path(&self.config.persistence_path)
    }

    /// Load any persisted state and start the send worker.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        self.load_persisted();

        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let flush_interval = self.config.flush_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(flush_interval) => {
                        this.process_batch().await;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });
        *self.worker.lock() = Some(handle);
        info!("durable queue started");
        Ok(())
    }

    /// Signal the worker to stop, wait for it to exit, then persist final
    /// state. Idempotent.
    pub async fn stop(self: &Arc<Self>) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.await;
        }
        self.persist_now()?;
        info!("durable queue stopped");
        Ok(())
    }

    fn load_persisted(&self) {
        match persistence::load(&self.persistence_dir()) {
            Ok(Some(data)) => {
                let pending_count = data.pending.len();
                for msg in data.pending {
                    self.queue.push(msg);
                }
                let mut maps = self.maps.lock();
                for msg in data.failed {
                    maps.failed.insert(msg.id, msg);
                }
                drop(maps);
                *self.stats.lock() = data.stats;
                info!(pending = pending_count, "loaded persisted queue state");
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to load persisted queue state"),
        }
    }

    fn persist_now(&self) -> anyhow::Result<()> {
        let pending = self.queue.snapshot();
        let maps = self.maps.lock();
        let failed: Vec<QueuedMessage> = maps.failed.values().cloned().collect();
        let stats = self.stats.lock().clone();
        let data = PersistedQueue {
            pending,
            failed,
            stats,
            timestamp: Utc::now(),
        };
        drop(maps);
        persistence::persist(&self.persistence_dir(), &data)
    }

    fn note_modification(&self) {
        self.report_queue_depth();
        let count = self.modifications.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PERSIST_EVERY == 0 {
            if let Err(err) = self.persist_now() {
                warn!(error = %err, "periodic queue persistence failed");
            }
        }
    }

    /// Evict the lowest-priority (oldest on ties) message if `push`ing one
    /// more would exceed the configured max size.
    fn make_room_if_needed(&self) {
        if self.queue.size() < self.config.max_queue_size {
            return;
        }
        if let Some(victim_id) = self.queue.lowest_priority_oldest() {
            if self.queue.remove(victim_id) {
                warn!(id = %victim_id, "queue full, dropping lowest priority message");
            }
        }
    }

    pub fn enqueue(
        &self,
        text: impl Into<String>,
        destination: Option<String>,
        priority: AlertPriority,
        protocol: Protocol,
        metadata: serde_json::Value,
    ) -> Uuid {
        let msg = QueuedMessage::new(
            text,
            destination,
            priority,
            protocol,
            self.default_max_retries,
            metadata,
        );
        self.enqueue_message(msg)
    }

    pub fn enqueue_message(&self, message: QueuedMessage) -> Uuid {
        self.make_room_if_needed();
        let id = message.id;
        debug!(id = %id, priority = ?message.priority, "enqueued message");
        self.queue.push(message);
        self.stats.lock().total_queued += 1;
        self.note_modification();
        id
    }

    pub fn get_message(&self, id: Uuid) -> Option<QueuedMessage> {
        if let Some(msg) = self.queue.snapshot().into_iter().find(|m| m.id == id) {
            return Some(msg);
        }
        let maps = self.maps.lock();
        maps.sent.get(&id).or_else(|| maps.failed.get(&id)).cloned()
    }

    pub fn retry_failed(&self, id: Uuid) -> bool {
        let mut maps = self.maps.lock();
        if let Some(mut msg) = maps.failed.remove(&id) {
            msg.status = MessageStatus::Pending;
            msg.retry_count = 0;
            drop(maps);
            self.queue.push(msg);
            self.note_modification();
            true
        } else {
            false
        }
    }

    pub fn retry_all_failed(&self) -> usize {
        let ids: Vec<Uuid> = self.maps.lock().failed.keys().copied().collect();
        ids.into_iter().filter(|id| self.retry_failed(*id)).count()
    }

    pub fn status(&self) -> QueueStatus {
        let maps = self.maps.lock();
        QueueStatus {
            pending: self.queue.size(),
            failed: maps.failed.len(),
            sent: maps.sent.len(),
            stats: self.stats.lock().clone(),
        }
    }

    async fn process_batch(&self) {
        let handler = self.send_handler.read().clone();
        let Some(handler) = handler else {
            return;
        };
        let mut processed = 0usize;
        while processed < self.config.batch_size {
            let Some(mut message) = self.queue.pop() else {
                break;
            };
            processed += 1;
            message.status = MessageStatus::Sending;
            message.sent_at = Some(Utc::now());
            let ok = handler.send(&message).await;
            if ok {
                self.on_delivered(message);
            } else {
                self.on_send_failed(message);
            }
        }
    }

    fn on_delivered(&self, mut message: QueuedMessage) {
        message.status = MessageStatus::Delivered;
        message.delivered_at = Some(Utc::now());
        let queue_time_ms = (message.delivered_at.unwrap() - message.created_at)
            .num_milliseconds() as f64;
        {
            let mut stats = self.stats.lock();
            stats.record_delivery(queue_time_ms);
        }
        let id = message.id;
        self.maps.lock().sent.insert(id, message);
        self.note_modification();
    }

    fn on_send_failed(&self, mut message: QueuedMessage) {
        message.retry_count += 1;
        self.stats.lock().total_retried += 1;
        if message.retry_count < message.max_retries {
            message.status = MessageStatus::Pending;
            message.priority = message.priority.demote();
            warn!(id = %message.id, retry = message.retry_count, max = message.max_retries, "message send failed, retrying");
            self.queue.push(message);
        } else {
            message.status = MessageStatus::Failed;
            warn!(id = %message.id, retries = message.retry_count, "message failed permanently");
            let id = message.id;
            self.maps.lock().failed.insert(id, message);
        }
        self.note_modification();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn test_config(dir: &std::path::Path) -> QueueConfig {
        QueueConfig {
            max_queue_size: 3,
            batch_size: 10,
            flush_interval: Duration::from_millis(20),
            persistence_path: dir.to_string_lossy().to_string(),
        }
    }

    struct AlwaysOk;
    #[async_trait::async_trait]
    impl SendHandler for AlwaysOk {
        async fn send(&self, _message: &QueuedMessage) -> bool {
            true
        }
    }

    struct AlwaysFail;
    #[async_trait::async_trait]
    impl SendHandler for AlwaysFail {
        async fn send(&self, _message: &QueuedMessage) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn basic_enqueue_send() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::new(test_config(dir.path()), 3);
        queue.set_send_handler(Arc::new(AlwaysOk));
        queue.start().await.unwrap();
        queue.enqueue_message(QueuedMessage::new(
            "disk full",
            None,
            AlertPriority::Medium,
            Protocol::Mesh,
            3,
            serde_json::json!({}),
        ));
        tokio::time::sleep(Duration::from_millis(80)).await;
        let status = queue.status();
        assert_eq!(status.pending, 0);
        assert_eq!(status.sent, 1);
        queue.stop().await.unwrap();
    }

    #[tokio::test]
    async fn retry_demotes_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::new(test_config(dir.path()), 3);
        queue.set_send_handler(Arc::new(AlwaysFail));
        queue.start().await.unwrap();
        let msg = QueuedMessage::new(
            "node down",
            None,
            AlertPriority::High,
            Protocol::Mesh,
            3,
            serde_json::json!({}),
        );
        let id = msg.id;
        queue.enqueue_message(msg);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let failed = queue.get_message(id).unwrap();
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.retry_count, 3);
        assert_eq!(failed.priority, AlertPriority::Low);
        queue.stop().await.unwrap();
    }

    #[tokio::test]
    async fn overflow_evicts_lowest_priority() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::new(test_config(dir.path()), 3);
        let counter = Arc::new(AtomicUsize::new(0));
        let c2 = counter.clone();
        queue.set_send_handler(Arc::new(move |_m: &QueuedMessage| {
            c2.fetch_add(1, Ordering::SeqCst);
            false
        }));
        // don't start the worker; we only exercise enqueue overflow here
        for _ in 0..3 {
            queue.enqueue_message(QueuedMessage::new(
                "low",
                None,
                AlertPriority::Low,
                Protocol::Mesh,
                3,
                serde_json::json!({}),
            ));
        }
        assert_eq!(queue.status().pending, 3);
        queue.enqueue_message(QueuedMessage::new(
            "critical",
            None,
            AlertPriority::Critical,
            Protocol::Mesh,
            3,
            serde_json::json!({}),
        ));
        assert_eq!(queue.status().pending, 3);
        let popped = queue.queue.pop().unwrap();
        assert_eq!(popped.priority, AlertPriority::Critical);
    }

    #[tokio::test]
    async fn persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let queue = DurableQueue::new(config.clone(), 0);
        queue.set_send_handler(Arc::new(AlwaysFail));
        let id = queue.enqueue_message(QueuedMessage::new(
            "restart me",
            None,
            AlertPriority::Medium,
            Protocol::Mesh,
            0,
            serde_json::json!({}),
        ));
        queue.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        queue.stop().await.unwrap();

        let reloaded = DurableQueue::new(config, 0);
        reloaded.load_persisted();
        let restored = reloaded.get_message(id);
        assert!(restored.is_some());
    }
}
