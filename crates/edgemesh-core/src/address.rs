//! Sender addresses.
//!
//! An address is a prefix followed by the URL-safe base64 encoding of a
//! compressed secp256k1 public key. Only [`ADDRESS_PREFIX`] is ever produced;
//! [`LEGACY_ADDRESS_PREFIXES`] are accepted on input.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{decode_base64url, PublicKey, COMPRESSED_KEY_LEN};
use crate::error::{CoreError, Result};

/// The canonical address prefix.
pub const ADDRESS_PREFIX: &str = "0xai_";

/// Prefixes accepted when parsing addresses from older senders.
pub const LEGACY_ADDRESS_PREFIXES: &[&str] = &["aixp_"];

/// A sender address derived from a compressed public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Derive the canonical address of a public key.
    pub fn from_public_key(pk: &PublicKey) -> Self {
        Self(format!("{}{}", ADDRESS_PREFIX, URL_SAFE.encode(pk.as_bytes())))
    }

    /// Recover the public key this address encodes.
    pub fn public_key(&self) -> Result<PublicKey> {
        address_to_public_key(&self.0)
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address without its prefix.
    pub fn without_prefix(&self) -> &str {
        strip_address_prefix(&self.0)
    }
}

/// Derive the canonical address string of a public key.
pub fn address_from_public_key(pk: &PublicKey) -> String {
    Address::from_public_key(pk).0
}

/// Decode an address string (any recognized prefix) back to its public key.
pub fn address_to_public_key(address: &str) -> Result<PublicKey> {
    let body = strip_address_prefix(address);
    let bytes = decode_base64url(body)
        .map_err(|_| CoreError::InvalidAddress(format!("not base64url: {}", address)))?;
    if bytes.len() != COMPRESSED_KEY_LEN {
        return Err(CoreError::InvalidAddress(format!(
            "expected {} key bytes, got {}",
            COMPRESSED_KEY_LEN,
            bytes.len()
        )));
    }
    PublicKey::from_sec1_bytes(&bytes)
}

/// Strip any recognized prefix from an address string.
pub fn strip_address_prefix(address: &str) -> &str {
    std::iter::once(ADDRESS_PREFIX)
        .chain(LEGACY_ADDRESS_PREFIXES.iter().copied())
        .find_map(|prefix| address.strip_prefix(prefix))
        .unwrap_or(address)
}

impl FromStr for Address {
    type Err = CoreError;

    /// Parse and normalize an address; legacy prefixes are rewritten to the
    /// canonical one.
    fn from_str(s: &str) -> Result<Self> {
        let pk = address_to_public_key(s)?;
        Ok(Self::from_public_key(&pk))
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &str = "0xai_A3vtcVIv_yL7k945IuhNjLUXKj2DPvbapoH4D6ZairfT";

    #[test]
    fn test_known_address_roundtrip() {
        let pk = address_to_public_key(KNOWN).unwrap();
        assert_eq!(pk.as_bytes()[0], 0x03);
        assert_eq!(address_from_public_key(&pk), KNOWN);
    }

    #[test]
    fn test_legacy_prefix_normalized() {
        let legacy = format!("aixp_{}", &KNOWN[ADDRESS_PREFIX.len()..]);
        let address: Address = legacy.parse().unwrap();
        assert_eq!(address.as_str(), KNOWN);
        assert_eq!(
            address_to_public_key(&legacy).unwrap(),
            address_to_public_key(KNOWN).unwrap()
        );
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_address_prefix("0xai_abc"), "abc");
        assert_eq!(strip_address_prefix("aixp_abc"), "abc");
        assert_eq!(strip_address_prefix("abc"), "abc");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(address_to_public_key("0xai_").is_err());
        assert!(address_to_public_key("0xai_!!!").is_err());
        // Valid base64 but too short for a key
        assert!(address_to_public_key("0xai_AAAA").is_err());
        assert!("not-an-address".parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let address: Address = KNOWN.parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", KNOWN));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
