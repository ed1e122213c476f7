//! The secure (store-and-forward) transport supervisor: component E of the
//! bridge. Owns a long-lived keypair identity, an announce loop, a
//! directory of known destinations and a bounded inbound message log.

pub mod directory;
pub mod identity;
pub mod message;
pub mod supervisor;

pub use identity::Identity;
pub use message::SecureMessage;
pub use supervisor::SecureSupervisor;
