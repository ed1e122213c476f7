use async_trait::async_trait;
use bridge_model::ConnectionState;

use crate::counters::TransportCounterSnapshot;

/// Contract every radio/network transport implementation fulfils.
/// `send` returns the id of the accepted packet, not confirmation of
/// delivery; callers learn about delivery asynchronously through the ack
/// correlation path.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> bool;
    async fn disconnect(&self);
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
    fn state(&self) -> ConnectionState;
    async fn send(
        &self,
        text: &str,
        destination: Option<&str>,
        want_ack: bool,
        channel_index: Option<u8>,
    ) -> Option<String>;
    fn stats(&self) -> TransportCounterSnapshot;
    fn name(&self) -> &'static str;
}
