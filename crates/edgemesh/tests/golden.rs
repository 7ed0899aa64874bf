//! Golden vectors for cross-implementation verification.
//!
//! The key, hash and signature were produced with OpenSSL. Every
//! implementation must derive the same address and canonical hash, accept
//! the OpenSSL signature, and produce envelopes OpenSSL would accept.

use edgemesh::core::{canonical_string, verify, verify_value, SignedEnvelope};
use edgemesh::Identity;
use edgemesh_testkit::vectors::{
    gts_message, GTS_CANONICAL, GTS_HASH, GTS_SIGNED, MNEMONIC, MNEMONIC_ADDRESS, PEM,
    PEM_ADDRESS,
};
use serde_json::Value;

#[test]
fn test_pem_identity() {
    let identity = Identity::load(Some(PEM)).unwrap();
    assert_eq!(identity.address().as_str(), PEM_ADDRESS);
}

#[test]
fn test_mnemonic_identity() {
    let identity = Identity::from_mnemonic(MNEMONIC).unwrap();
    assert_eq!(identity.address().as_str(), MNEMONIC_ADDRESS);
}

#[test]
fn test_gts_signing_scenario() {
    let identity = Identity::load(Some(PEM)).unwrap();
    let message = gts_message();
    let envelope = identity.sign(&message).unwrap();

    assert_eq!(canonical_string(&message), GTS_CANONICAL);
    assert_eq!(envelope.hash(), Some(GTS_HASH));
    assert_eq!(envelope.sender(), Some(PEM_ADDRESS));
    assert!(verify(&envelope.to_json()));

    // The caller's message is left untouched
    assert!(message.get("EE_SIGN").is_none());
}

#[test]
fn test_received_envelope_verifies() {
    assert!(verify(GTS_SIGNED));

    let value: Value = serde_json::from_str(GTS_SIGNED).unwrap();
    let envelope = SignedEnvelope::from_map(value.as_object().cloned().unwrap());
    assert!(envelope.check().is_ok());
    assert_eq!(Value::Object(envelope.content()), gts_message());
}

#[test]
fn test_received_envelope_tampering() {
    let value: Value = serde_json::from_str(GTS_SIGNED).unwrap();

    let mut payload = value.clone();
    payload["PAYLOAD"]["GIGI"] = Value::String("BUNB".into());
    assert!(!verify_value(&payload));

    let mut sender = value.clone();
    sender["EE_SENDER"] = Value::String(Identity::generate().address().to_string());
    assert!(!verify_value(&sender));

    let mut hash = value.clone();
    hash["EE_HASH"] = Value::String(GTS_HASH.replace("feca", "feda"));
    assert!(!verify_value(&hash));

    let mut signature = value;
    let sign = signature["EE_SIGN"].as_str().unwrap().replace("MEQCIGTe", "MEQCIGTf");
    signature["EE_SIGN"] = Value::String(sign);
    assert!(!verify_value(&signature));
}
