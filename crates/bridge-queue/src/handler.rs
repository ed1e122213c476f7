use async_trait::async_trait;
use bridge_model::QueuedMessage;

/// Pluggable delivery mechanism the durable queue's send worker calls on
/// every dequeued message. Transport supervisors implement this and are
/// wired in via [`crate::DurableQueue::set_send_handler`] after both sides
/// of the composition have been constructed.
#[async_trait]
pub trait SendHandler: Send + Sync {
    async fn send(&self, message: &QueuedMessage) -> bool;
}

#[async_trait]
impl<F> SendHandler for F
where
    F: Fn(&QueuedMessage) -> bool + Send + Sync,
{
    async fn send(&self, message: &QueuedMessage) -> bool {
        (self)(message)
    }
}
