//! Shared data model for the Mesh Bridge: alerts, queued messages, mesh
//! nodes, and the small set of enums that carry routing/state decisions.
//!
//! Every type here round-trips through JSON with enum variants encoded as
//! names, never ordinals, so persisted state survives code reorderings.
//! Decoding an unrecognised variant name is a hard error, not a silent
//! coercion — `serde`'s derived enum visitor already rejects unknown
//! variants by construction.

pub mod alert;
pub mod connectivity;
pub mod message;
pub mod node;
pub mod priority;

pub use alert::{Alert, RoutingRule, MAX_MESH_PAYLOAD_BYTES};
pub use connectivity::{ConnectivityState, KnownDestination};
pub use message::QueuedMessage;
pub use node::{DeliveryReceipt, Node, NodeUpdate, Position};
pub use priority::{AlertPriority, ConnectionState, MessageStatus, Protocol};
