//! Canonical JSON encoding for deterministic hashing.
//!
//! The canonical form is the one edge nodes hash before verifying a command:
//! - Object keys sorted by their UTF-8 bytes, at every depth
//! - No insignificant whitespace (`,` and `:` separators)
//! - Non-ASCII characters escaped as `\uXXXX` (UTF-16 code units)
//! - Numbers written exactly as received; integers of any size keep their
//!   digits
//!
//! Two values that are equal as JSON always produce identical bytes, no
//! matter the insertion order of their keys.

use serde_json::{Map, Value};
use std::fmt::Write as _;

use crate::crypto::Sha256Hash;
use crate::error::{CoreError, Result};

/// Encode a JSON value to canonical bytes.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

/// Encode a JSON value to its canonical string form.
pub fn canonical_string(value: &Value) -> String {
    let mut buf = String::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Hash an object (or array) through its canonical encoding.
pub fn canonical_hash(value: &Value) -> Sha256Hash {
    Sha256Hash::hash(&canonical_bytes(value))
}

/// Hash arbitrary input the way the signing engine does.
///
/// Strings are hashed as raw UTF-8 text, objects and arrays through their
/// canonical encoding. Scalars are rejected.
pub fn hash_input(value: &Value) -> Result<Sha256Hash> {
    match value {
        Value::String(text) => Ok(Sha256Hash::hash(text.as_bytes())),
        Value::Object(_) | Value::Array(_) => Ok(canonical_hash(value)),
        Value::Null => Err(CoreError::UnsupportedInputType("null")),
        Value::Bool(_) => Err(CoreError::UnsupportedInputType("bool")),
        Value::Number(_) => Err(CoreError::UnsupportedInputType("number")),
    }
}

/// Recursively encode a JSON value.
fn encode_value_to(buf: &mut String, value: &Value) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(buf, "{}", n);
        }
        Value::String(s) => encode_text(buf, s),
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                encode_value_to(buf, item);
            }
            buf.push(']');
        }
        Value::Object(map) => encode_map_canonical(buf, map),
    }
}

/// Encode an object with its keys sorted.
fn encode_map_canonical(buf: &mut String, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    buf.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        encode_text(buf, key);
        buf.push(':');
        encode_value_to(buf, value);
    }
    buf.push('}');
}

/// Encode a string literal with ASCII-only output.
fn encode_text(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{0c}' => buf.push_str("\\f"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(buf, "\\u{:04x}", unit);
                }
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let value = json!({
            "b": 1,
            "a": {"z": true, "y": null},
            "c": [ {"k2": 2, "k1": 1} ],
        });

        assert_eq!(
            canonical_string(&value),
            r#"{"a":{"y":null,"z":true},"b":1,"c":[{"k1":1,"k2":2}]}"#
        );
    }

    #[test]
    fn test_insertion_order_independent() {
        let mut first = Map::new();
        first.insert("SERVER".into(), json!("gts-test"));
        first.insert("COMMAND".into(), json!("UPDATE_CONFIG"));

        let mut second = Map::new();
        second.insert("COMMAND".into(), json!("UPDATE_CONFIG"));
        second.insert("SERVER".into(), json!("gts-test"));

        assert_eq!(
            canonical_hash(&Value::Object(first)),
            canonical_hash(&Value::Object(second))
        );
    }

    #[test]
    fn test_non_ascii_escaped() {
        let value = json!({"a": "é", "b": [1, 2.5, true, null]});
        assert_eq!(
            canonical_string(&value),
            r#"{"a":"\u00e9","b":[1,2.5,true,null]}"#
        );

        // Astral characters become surrogate pairs
        assert_eq!(canonical_string(&json!("😀")), r#""\ud83d\ude00""#);
    }

    #[test]
    fn test_control_characters_escaped() {
        assert_eq!(
            canonical_string(&json!("a\"b\\c\n\u{1}")),
            r#""a\"b\\c\n\u0001""#
        );
    }

    #[test]
    fn test_hash_input_kinds() {
        let text = hash_input(&json!("hello")).unwrap();
        assert_eq!(text, Sha256Hash::hash(b"hello"));

        let object = hash_input(&json!({"a": 1})).unwrap();
        assert_eq!(object, Sha256Hash::hash(br#"{"a":1}"#));

        assert!(matches!(
            hash_input(&json!(42)),
            Err(CoreError::UnsupportedInputType("number"))
        ));
        assert!(matches!(
            hash_input(&Value::Null),
            Err(CoreError::UnsupportedInputType("null"))
        ));
    }

    #[test]
    fn test_command_hash_vector() {
        let value = json!({
            "SERVER": "gts-test",
            "COMMAND": "UPDATE_CONFIG",
            "PAYLOAD": {"GIGI": "BUNA"},
        });
        assert_eq!(
            canonical_string(&value),
            r#"{"COMMAND":"UPDATE_CONFIG","PAYLOAD":{"GIGI":"BUNA"},"SERVER":"gts-test"}"#
        );
        assert_eq!(
            canonical_hash(&value).to_hex(),
            "feca4c4882b2b0cfb872c73bda948b77048ced67b9eeae10c8bdd9028f9d20a1"
        );
    }

    #[test]
    fn test_numbers_keep_their_text() {
        let text = r#"{"BIG":123456789012345678901234567890,"F":1e-05,"N":-7}"#;
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(canonical_string(&value), text);
    }

    #[test]
    fn test_big_integers_survive_signing() {
        let identity = crate::Identity::generate();
        let message: Value =
            serde_json::from_str(r#"{"COUNT":340282366920938463463374607431768211456}"#).unwrap();
        let envelope = identity.sign(&message).unwrap();
        assert!(crate::verify(&envelope.to_json()));
    }
}
