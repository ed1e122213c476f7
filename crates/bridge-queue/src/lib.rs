//! The priority-ordered, crash-safe outbound queue (components B and C of
//! the bridge): a binary heap with FIFO-within-priority ordering, wrapped
//! by a send worker that retries with priority demotion and periodically
//! persists pending/failed state to disk.

pub mod handler;
pub mod persistence;
pub mod priority_queue;
pub mod queue;
pub mod stats;

pub use handler::SendHandler;
pub use persistence::PersistedQueue;
pub use priority_queue::PriorityQueue;
pub use queue::{DurableQueue, QueueStatus};
pub use stats::QueueStats;
