//! Error types for edgemesh core.

use thiserror::Error;

/// Errors raised by hashing, key management and signing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The key container could not be decoded.
    #[error("key decode error: {0}")]
    KeyDecode(String),

    /// Signing was attempted before an identity was loaded.
    #[error("no identity loaded")]
    NoIdentity,

    /// Hashing was given something that is neither text nor structured data.
    #[error("unsupported input type for hashing: {0}")]
    UnsupportedInputType(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
