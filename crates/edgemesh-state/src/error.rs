//! Error types for the state cache.

use thiserror::Error;

/// Errors raised while turning inbound messages into cache entries.
#[derive(Debug, Error)]
pub enum StateError {
    /// A heartbeat did not have the expected shape.
    #[error("invalid heartbeat: {0}")]
    InvalidHeartbeat(String),

    /// A network snapshot did not have the expected shape.
    #[error("invalid network snapshot: {0}")]
    InvalidNetworkSnapshot(String),
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;
