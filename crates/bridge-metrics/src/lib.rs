//! Prometheus registry, counters/gauges, and the `/metrics` exporter used
//! across the bridge's components.

pub mod server;

pub use server::{new_registry, spawn_http_server, BridgeMetrics, MetricsServer, SharedRegistry};
