//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

use edgemesh_core::{Identity, PathTuple};

/// Generate an identity from random secret bytes.
///
/// Byte strings that are not valid scalars are rejected by proptest.
pub fn identity() -> impl Strategy<Value = Identity> {
    any::<[u8; 32]>().prop_filter_map("invalid secret scalar", |bytes| {
        Identity::from_secret_bytes(&bytes).ok()
    })
}

/// Generate a wire-style key (upper case, underscores).
pub fn field_name() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9_]{0,11}".prop_map(String::from)
}

/// Generate a JSON leaf, including non-ASCII strings.
pub fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(Number::from(n))),
        "[a-z0-9 ]{0,16}".prop_map(Value::String),
        "\\PC{0,8}".prop_map(Value::String),
    ]
}

/// Generate a nested JSON value.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(field_name(), inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate a JSON object suitable as a command or message body.
pub fn json_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_name(), json_value(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate a node identifier.
pub fn node_id() -> impl Strategy<Value = String> {
    "node-[a-z0-9]{1,6}".prop_map(String::from)
}

/// Generate a fully specified path.
pub fn path_tuple() -> impl Strategy<Value = PathTuple> {
    (
        node_id(),
        "[a-z]{1,6}",
        "[A-Z_]{1,8}",
        "[a-z0-9]{1,6}",
    )
        .prop_map(|(node, pipeline, signature, instance)| {
            PathTuple::instance(node, pipeline, signature, instance)
        })
}

/// Parameters for a watch pattern derived from a concrete path.
#[derive(Debug, Clone)]
pub struct WatchParams {
    pub path: PathTuple,
    /// Which of pipeline, signature, instance become wildcards.
    pub wildcards: [bool; 3],
}

impl WatchParams {
    /// The pattern with the selected fields cleared.
    pub fn pattern(&self) -> PathTuple {
        let mut pattern = self.path.clone();
        if self.wildcards[0] {
            pattern.pipeline = None;
        }
        if self.wildcards[1] {
            pattern.signature = None;
        }
        if self.wildcards[2] {
            pattern.instance = None;
        }
        pattern
    }
}

impl Arbitrary for WatchParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (path_tuple(), any::<[bool; 3]>())
            .prop_map(|(path, wildcards)| WatchParams { path, wildcards })
            .boxed()
    }
}
