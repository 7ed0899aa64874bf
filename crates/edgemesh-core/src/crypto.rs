//! Cryptographic primitives for edgemesh.
//!
//! Wraps secp256k1 ECDSA and SHA-256 hashing with strong types.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CoreError, Result};

/// Length of a SEC1 compressed secp256k1 point.
pub const COMPRESSED_KEY_LEN: usize = 33;

/// A 32-byte SHA-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::DecodingError("hash must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHA256({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A compressed secp256k1 public key (33 bytes, SEC1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; COMPRESSED_KEY_LEN]);

impl PublicKey {
    /// Create from compressed SEC1 bytes, validating the point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Self::from(&key))
    }

    /// Get the raw compressed bytes.
    pub const fn as_bytes(&self) -> &[u8; COMPRESSED_KEY_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a DER signature over `message`.
    ///
    /// The message is hashed with SHA-256 before ECDSA verification. High-S
    /// signatures are normalized first, since other stacks do not enforce
    /// low-S when signing.
    pub fn verify(&self, message: &[u8], signature: &DerSignature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = Signature::from_der(&signature.0).map_err(|_| CoreError::InvalidSignature)?;
        let sig = sig.normalize_s().unwrap_or(sig);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl From<&VerifyingKey> for PublicKey {
    fn from(key: &VerifyingKey) -> Self {
        // SEC1 compressed encoding is always 33 bytes
        let sec1 = key.to_sec1_bytes();
        let mut bytes = [0u8; COMPRESSED_KEY_LEN];
        bytes.copy_from_slice(&sec1[..COMPRESSED_KEY_LEN]);
        Self(bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secp256k1Pub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A DER-encoded ECDSA signature.
#[derive(Clone, PartialEq, Eq)]
pub struct DerSignature(pub Vec<u8>);

impl DerSignature {
    /// Get the raw DER bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode as URL-safe base64, the form carried in `EE_SIGN`.
    pub fn to_base64url(&self) -> String {
        URL_SAFE.encode(&self.0)
    }

    /// Decode from URL-safe base64 (padding optional).
    pub fn from_base64url(s: &str) -> Result<Self> {
        decode_base64url(s).map(Self)
    }
}

impl fmt::Debug for DerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(&self.0);
        write!(f, "DerSig({}...)", &hex[..hex.len().min(16)])
    }
}

/// Decode URL-safe base64, accepting input with or without `=` padding.
pub fn decode_base64url(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|e| CoreError::DecodingError(e.to_string()))
}

/// Convert standard base64 to its URL-safe form (`+` → `-`, `/` → `_`).
pub fn base64_to_urlsafe(s: &str) -> String {
    s.replace('+', "-").replace('/', "_")
}

/// Convert URL-safe base64 back to standard base64.
pub fn urlsafe_to_base64(s: &str) -> String {
    s.replace('-', "+").replace('_', "/")
}

/// Encode bytes as standard base64.
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard base64.
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| CoreError::DecodingError(e.to_string()))
}
