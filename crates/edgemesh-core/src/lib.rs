//! # edgemesh core
//!
//! Pure primitives for the edgemesh control-plane client: canonical hashing,
//! secp256k1 identities, addresses and signed envelopes.
//!
//! This crate contains no I/O beyond optional key files. It is pure
//! computation over the data exchanged with edge nodes.
//!
//! ## Key Types
//!
//! - [`Identity`] - A secp256k1 key pair with its cached [`Address`]
//! - [`SignedEnvelope`] - A JSON object carrying `EE_HASH`, `EE_SIGN`, `EE_SENDER`
//! - [`PathTuple`] - `(node, pipeline, signature, instance)` state path
//!
//! ## Canonicalization
//!
//! Content hashes are computed over sorted-key, compact, ASCII-escaped JSON.
//! See the [`canonical`] module.

pub mod address;
pub mod canonical;
pub mod codec;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod mnemonic;
pub mod path;
pub mod time;

pub use address::{
    address_from_public_key, address_to_public_key, strip_address_prefix, Address,
    ADDRESS_PREFIX,
};
pub use canonical::{canonical_bytes, canonical_hash, canonical_string, hash_input};
pub use codec::{compress_text, decompress_text};
pub use crypto::{DerSignature, PublicKey, Sha256Hash};
pub use envelope::{has_signature, verify, verify_value, SignedEnvelope};
pub use error::{CoreError, Result};
pub use identity::{Identity, IdentitySlot};
pub use mnemonic::generate_mnemonic;
pub use path::{PathTuple, PAYLOAD_PATH_FIELD};
pub use time::now_millis;
