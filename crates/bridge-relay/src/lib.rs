//! The relay bridges the mesh and secure transports: dedup by content hash
//! and route by an explicit prefix or the node-mapping directory.

pub mod relay;
pub mod stats;

pub use relay::MessageRelay;
pub use stats::RelayStats;
