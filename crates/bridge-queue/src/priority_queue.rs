use std::cmp::Reverse;
use std::collections::BinaryHeap;

use bridge_model::QueuedMessage;
use parking_lot::Mutex;
use uuid::Uuid;

/// Heap entry ordered so that `BinaryHeap::pop` returns the most urgent
/// message first, breaking ties by insertion order (smaller counter wins).
struct HeapEntry {
    key: Reverse<(u8, u64)>,
    message: QueuedMessage,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

struct State {
    heap: BinaryHeap<HeapEntry>,
    counter: u64,
}

/// Thread-safe priority queue with FIFO-within-priority ordering and
/// O(n) removal by id. All operations are serialized under a single
/// mutex; callers never observe a torn update.
pub struct PriorityQueue {
    state: Mutex<State>,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                counter: 0,
            }),
        }
    }

    pub fn push(&self, message: QueuedMessage) {
        let mut state = self.state.lock();
        let counter = state.counter;
        state.counter += 1;
        state.heap.push(HeapEntry {
            key: Reverse((message.priority.value(), counter)),
            message,
        });
    }

    pub fn pop(&self) -> Option<QueuedMessage> {
        let mut state = self.state.lock();
        state.heap.pop().map(|entry| entry.message)
    }

    pub fn peek(&self) -> Option<QueuedMessage> {
        let state = self.state.lock();
        state.heap.peek().map(|entry| entry.message.clone())
    }

    pub fn size(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// All queued messages, highest priority first.
    pub fn snapshot(&self) -> Vec<QueuedMessage> {
        let state = self.state.lock();
        let mut entries: Vec<&HeapEntry> = state.heap.iter().collect();
        entries.sort_by_key(|e| e.key);
        entries.into_iter().map(|e| e.message.clone()).collect()
    }

    /// Remove a specific message by id. O(n), re-heapifies; acceptable
    /// because queue depth is bounded by the configured max size.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut state = self.state.lock();
        let items: Vec<HeapEntry> = state.heap.drain().collect();
        let mut removed = false;
        let mut rebuilt = BinaryHeap::with_capacity(items.len());
        for entry in items {
            if !removed && entry.message.id == id {
                removed = true;
                continue;
            }
            rebuilt.push(entry);
        }
        state.heap = rebuilt;
        removed
    }

    /// Select the id to evict on overflow: the lowest-priority (highest
    /// numeric value) message present; ties broken toward the oldest
    /// (smallest insertion counter).
    pub fn lowest_priority_oldest(&self) -> Option<Uuid> {
        let state = self.state.lock();
        state
            .heap
            .iter()
            .max_by(|a, b| {
                let (ap, ac) = a.key.0;
                let (bp, bc) = b.key.0;
                ap.cmp(&bp).then(bc.cmp(&ac))
            })
            .map(|entry| entry.message.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_model::{AlertPriority, Protocol};

    fn msg(priority: AlertPriority) -> QueuedMessage {
        QueuedMessage::new("hi", None, priority, Protocol::Mesh, 3, serde_json::json!({}))
    }

    #[test]
    fn fifo_within_priority() {
        let q = PriorityQueue::new();
        let a = msg(AlertPriority::Low);
        let b = msg(AlertPriority::Low);
        let a_id = a.id;
        let b_id = b.id;
        q.push(a);
        q.push(b);
        assert_eq!(q.pop().unwrap().id, a_id);
        assert_eq!(q.pop().unwrap().id, b_id);
    }

    #[test]
    fn higher_priority_overtakes() {
        let q = PriorityQueue::new();
        for _ in 0..5 {
            q.push(msg(AlertPriority::Low));
        }
        let critical = msg(AlertPriority::Critical);
        let critical_id = critical.id;
        q.push(critical);
        assert_eq!(q.pop().unwrap().id, critical_id);
    }

    #[test]
    fn remove_by_id() {
        let q = PriorityQueue::new();
        let a = msg(AlertPriority::Medium);
        let id = a.id;
        q.push(a);
        q.push(msg(AlertPriority::Medium));
        assert!(q.remove(id));
        assert_eq!(q.size(), 1);
        assert!(!q.remove(id));
    }

    #[test]
    fn eviction_targets_lowest_priority_oldest() {
        let q = PriorityQueue::new();
        let first_low = msg(AlertPriority::Low);
        let first_low_id = first_low.id;
        q.push(first_low);
        q.push(msg(AlertPriority::Low));
        q.push(msg(AlertPriority::Critical));
        let victim = q.lowest_priority_oldest().unwrap();
        assert_eq!(victim, first_low_id);
    }
}
