//! The ISP connectivity monitor: component F of the bridge. Probes
//! reachability independently of any transport and notifies a registered
//! failover handler on debounced online/offline transitions.

pub mod handler;
pub mod monitor;
pub mod probe;

pub use handler::FailoverHandler;
pub use monitor::ConnectivityMonitor;
pub use probe::{ProbeResult, Prober, SystemPinger};
