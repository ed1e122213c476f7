//! Shared primitives for the Mesh Bridge workspace: configuration loading,
//! structured logging setup, and small time helpers used by every
//! supervisory component.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::{
    AlertConfig, BridgeConfig, HttpConfig, LoggingConfig, MeshConfig, QueueConfig, SecureConfig,
};
pub use error::BridgeError;
pub use logging::init_tracing;
