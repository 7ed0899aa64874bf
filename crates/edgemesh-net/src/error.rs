//! Error types for the network layer.

use thiserror::Error;

/// Errors raised by routing, correlation and transport.
#[derive(Debug, Error)]
pub enum NetError {
    /// A request did not resolve in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A frame named a formatter that is not registered.
    #[error("unknown formatter: {0}")]
    UnknownFormat(String),

    /// A frame could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The node is not part of the configured fleet.
    #[error("node not in fleet: {0}")]
    FleetMembership(String),

    /// The node answered a command with an exception notification.
    #[error("command rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Core operation failed.
    #[error("core error: {0}")]
    Core(#[from] edgemesh_core::CoreError),

    /// State cache rejected a message.
    #[error("state error: {0}")]
    State(#[from] edgemesh_state::StateError),
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
