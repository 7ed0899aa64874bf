//! Signed message envelopes.
//!
//! A signed envelope is any JSON object extended with three reserved fields:
//!
//! | Field       | Content                                                      |
//! |-------------|--------------------------------------------------------------|
//! | `EE_HASH`   | hex SHA-256 of the canonical object without signing fields   |
//! | `EE_SIGN`   | URL-safe base64 DER ECDSA signature over SHA-256(hash bytes) |
//! | `EE_SENDER` | address of the signer                                        |
//!
//! Verification recomputes the hash and checks the signature independently;
//! both must pass.

use serde_json::{Map, Value};

use crate::address::address_to_public_key;
use crate::canonical::canonical_hash;
use crate::crypto::{DerSignature, Sha256Hash};
use crate::error::{CoreError, Result};
use crate::identity::Identity;

/// Field carrying the signature.
pub const SIGN_FIELD: &str = "EE_SIGN";
/// Field carrying the signer address.
pub const SENDER_FIELD: &str = "EE_SENDER";
/// Field carrying the content hash.
pub const HASH_FIELD: &str = "EE_HASH";

/// All reserved signing fields, excluded from the content hash.
pub const SIGNING_FIELDS: [&str; 3] = [SIGN_FIELD, SENDER_FIELD, HASH_FIELD];

/// A JSON object carrying signing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedEnvelope {
    fields: Map<String, Value>,
}

impl SignedEnvelope {
    /// Sign `message` with `identity`.
    ///
    /// The caller's value is not modified; any signing fields it already
    /// carries are replaced.
    pub fn sign(identity: &Identity, message: &Value) -> Result<Self> {
        let mut fields = match message {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(CoreError::UnsupportedInputType(
                    "only JSON objects can be signed",
                ))
            }
        };
        strip_signing_fields(&mut fields);

        let hash = canonical_hash(&Value::Object(fields.clone()));
        let signature = identity.sign_hash(&hash);

        fields.insert(HASH_FIELD.into(), Value::String(hash.to_hex()));
        fields.insert(SIGN_FIELD.into(), Value::String(signature.to_base64url()));
        fields.insert(
            SENDER_FIELD.into(),
            Value::String(identity.address().to_string()),
        );

        Ok(Self { fields })
    }

    /// Wrap an already-signed object without checking it.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The carried content hash, if any.
    pub fn hash(&self) -> Option<&str> {
        self.fields.get(HASH_FIELD).and_then(Value::as_str)
    }

    /// The carried signature, if any.
    pub fn signature(&self) -> Option<&str> {
        self.fields.get(SIGN_FIELD).and_then(Value::as_str)
    }

    /// The carried sender address, if any.
    pub fn sender(&self) -> Option<&str> {
        self.fields.get(SENDER_FIELD).and_then(Value::as_str)
    }

    /// Whether all three signing fields are present.
    pub fn is_signed(&self) -> bool {
        self.hash().is_some() && self.signature().is_some() && self.sender().is_some()
    }

    /// The message without its signing fields.
    pub fn content(&self) -> Map<String, Value> {
        let mut content = self.fields.clone();
        strip_signing_fields(&mut content);
        content
    }

    /// Borrow all fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert to a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Serialize to compact JSON text.
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// Check the hash and the signature.
    pub fn verify(&self) -> bool {
        self.check().is_ok()
    }

    /// Check the envelope, reporting which part failed.
    pub fn check(&self) -> Result<()> {
        let carried = self
            .hash()
            .ok_or_else(|| CoreError::DecodingError("missing EE_HASH".into()))?;
        let signature = self.signature().ok_or(CoreError::InvalidSignature)?;
        let sender = self
            .sender()
            .ok_or_else(|| CoreError::InvalidAddress("missing EE_SENDER".into()))?;

        let computed = canonical_hash(&Value::Object(self.content()));
        let hash_ok = computed.to_hex() == carried;

        let signature_ok = match Sha256Hash::from_hex(carried) {
            Ok(carried_hash) => {
                let public_key = address_to_public_key(sender)?;
                let signature = DerSignature::from_base64url(signature)?;
                public_key.verify(carried_hash.as_bytes(), &signature).is_ok()
            }
            Err(_) => false,
        };

        if !hash_ok {
            return Err(CoreError::DecodingError(format!(
                "hash mismatch: carried {}, computed {}",
                carried,
                computed.to_hex()
            )));
        }
        if !signature_ok {
            return Err(CoreError::InvalidSignature);
        }
        Ok(())
    }
}

/// Verify a JSON-encoded envelope.
///
/// Never fails: malformed, unsigned or mismatched input yields `false`.
pub fn verify(json: &str) -> bool {
    match serde_json::from_str::<Value>(json) {
        Ok(value) => verify_value(&value),
        Err(_) => false,
    }
}

/// Verify a parsed envelope. Non-objects yield `false`.
pub fn verify_value(value: &Value) -> bool {
    match value {
        Value::Object(map) => SignedEnvelope::from_map(map.clone()).verify(),
        _ => false,
    }
}

/// Whether a parsed message carries all signing fields.
pub fn has_signature(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| SIGNING_FIELDS.iter().all(|f| map.contains_key(*f)))
        .unwrap_or(false)
}

fn strip_signing_fields(fields: &mut Map<String, Value>) {
    for field in SIGNING_FIELDS {
        fields.remove(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Envelope signed by an independent ECDSA implementation.
    const SIGNED: &str = r#"{"SERVER":"gts-test","COMMAND":"UPDATE_CONFIG","PAYLOAD":{"GIGI":"BUNA"},"EE_HASH":"feca4c4882b2b0cfb872c73bda948b77048ced67b9eeae10c8bdd9028f9d20a1","EE_SIGN":"MEQCIGTe7fnzZ5_QS1w9XI_r40Rl-1JwpJuZ3WADQtuSVaixAiAGDr57mSeH_97Sh0M5fq2cnK-XNFSjeAIiNJRsQHau1Q==","EE_SENDER":"0xai_AzFoWeahDjJTbKRWRvFVjJV1BK4VyLktLt9ilESahDyK"}"#;

    fn command() -> Value {
        json!({
            "SERVER": "gts-test",
            "COMMAND": "UPDATE_CONFIG",
            "PAYLOAD": {"GIGI": "BUNA"},
        })
    }

    fn tamper(json: &str, field: &str) -> String {
        let mut value: Value = serde_json::from_str(json).unwrap();
        let text = value[field].as_str().unwrap().to_string();
        let mut chars: Vec<char> = text.chars().collect();
        // Change a character in the middle, away from prefix and padding
        let i = chars.len() / 2;
        chars[i] = if chars[i] == 'A' { 'B' } else { 'A' };
        value[field] = Value::String(chars.into_iter().collect());
        value.to_string()
    }

    #[test]
    fn test_sign_then_verify() {
        let identity = Identity::generate();
        let envelope = identity.sign(&command()).unwrap();

        assert!(envelope.is_signed());
        assert_eq!(envelope.sender(), Some(identity.address().as_str()));
        assert_eq!(
            envelope.hash(),
            Some("feca4c4882b2b0cfb872c73bda948b77048ced67b9eeae10c8bdd9028f9d20a1")
        );
        assert!(envelope.verify());
        assert!(verify(&envelope.to_json()));
    }

    #[test]
    fn test_sign_does_not_mutate_input() {
        let identity = Identity::generate();
        let message = command();
        let before = message.clone();
        let _ = identity.sign(&message).unwrap();
        assert_eq!(message, before);
    }

    #[test]
    fn test_resigning_replaces_old_fields() {
        let first = Identity::generate();
        let second = Identity::generate();
        let signed_once = first.sign(&command()).unwrap().into_value();
        let signed_twice = second.sign(&signed_once).unwrap();

        assert_eq!(signed_twice.sender(), Some(second.address().as_str()));
        assert!(signed_twice.verify());
    }

    #[test]
    fn test_external_envelope_verifies() {
        assert!(verify(SIGNED));
    }

    #[test]
    fn test_tampered_fields_fail() {
        for field in SIGNING_FIELDS {
            assert!(!verify(&tamper(SIGNED, field)), "tampered {} verified", field);
        }
        assert!(!verify(&tamper(SIGNED, "SERVER")));
    }

    #[test]
    fn test_payload_change_fails() {
        let mut value: Value = serde_json::from_str(SIGNED).unwrap();
        value["PAYLOAD"]["GIGI"] = json!("BUNA2");
        assert!(!verify_value(&value));
    }

    #[test]
    fn test_hash_match_without_signature_fails() {
        let mut value: Value = serde_json::from_str(SIGNED).unwrap();
        value.as_object_mut().unwrap().remove(SIGN_FIELD);
        assert!(!verify_value(&value));
    }

    #[test]
    fn test_valid_signature_over_forged_hash_fails() {
        // Sign a different message, then graft its hash and signature
        let identity = Identity::generate();
        let other = identity.sign(&json!({"SERVER": "other"})).unwrap();

        let mut value = command();
        let map = value.as_object_mut().unwrap();
        for field in SIGNING_FIELDS {
            map.insert(field.into(), other.fields()[field].clone());
        }
        assert!(!verify_value(&value));
    }

    #[test]
    fn test_malformed_input_is_false() {
        assert!(!verify("not json"));
        assert!(!verify("[1, 2, 3]"));
        assert!(!verify("{}"));
        assert!(!verify(r#"{"EE_HASH": "abc", "EE_SIGN": "abc"}"#));
    }

    #[test]
    fn test_has_signature() {
        let value: Value = serde_json::from_str(SIGNED).unwrap();
        assert!(has_signature(&value));
        assert!(!has_signature(&command()));
    }
}
