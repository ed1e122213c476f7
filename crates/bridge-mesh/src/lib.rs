//! The mesh (LoRa broadcast) transport supervisor: component D of the
//! bridge. Owns the device link, the node catalog and ack correlation, and
//! implements the shared `Transport` contract so the alert manager can
//! treat it interchangeably with the secure supervisor.

pub mod frame;
pub mod supervisor;

pub use frame::{InboundFrame, OutboundFrame};
pub use supervisor::MeshSupervisor;
