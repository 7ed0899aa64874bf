//! Error types for the client.

use edgemesh_core::CoreError;
use edgemesh_net::NetError;
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Identity or signing error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Routing, correlation or transport error.
    #[error("network error: {0}")]
    Net(#[from] NetError),

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request was dropped before it produced an outcome.
    #[error("request cancelled: {0}")]
    Cancelled(String),

    #[error("client already started")]
    AlreadyStarted,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
