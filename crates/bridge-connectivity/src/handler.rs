use std::future::Future;

use async_trait::async_trait;

/// Notified on every online/offline transition the monitor debounces past.
/// `active` mirrors `ConnectivityState::failover_active` after the
/// transition: `true` means the probe just went offline, `false` means it
/// just recovered.
#[async_trait]
pub trait FailoverHandler: Send + Sync {
    async fn on_failover(&self, active: bool);
}

#[async_trait]
impl<F, Fut> FailoverHandler for F
where
    F: Fn(bool) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn on_failover(&self, active: bool) {
        self(active).await
    }
}
