/// Error taxonomy shared across every Mesh Bridge component.
///
/// Kinds, not types: every fallible operation in the workspace maps onto
/// one of these variants rather than growing its own bespoke error enum.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),
    /// Wrapper for IO errors encountered during persistence or device access.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON (de)serialization failures.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// A transport is not in a state that permits the requested operation.
    #[error("transport unavailable: {0}")]
    Transport(&'static str),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
