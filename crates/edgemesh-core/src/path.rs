//! Payload paths.
//!
//! A [`PathTuple`] locates a piece of edge-node state:
//! `(node, pipeline, plugin signature, instance id)`. Trailing `None` fields
//! denote broader scopes. Inbound messages carry their path as the
//! `EE_PAYLOAD_PATH` array; watches use the same type as a pattern.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{CoreError, Result};

/// Field carrying the payload path of inbound messages.
pub const PAYLOAD_PATH_FIELD: &str = "EE_PAYLOAD_PATH";

/// A 4-element state path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[Option<String>; 4]", try_from = "[Option<String>; 4]")]
pub struct PathTuple {
    pub node: String,
    pub pipeline: Option<String>,
    pub signature: Option<String>,
    pub instance: Option<String>,
}

impl PathTuple {
    /// A node-wide path.
    pub fn node(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            pipeline: None,
            signature: None,
            instance: None,
        }
    }

    /// A pipeline-wide path.
    pub fn pipeline(node: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: Some(pipeline.into()),
            ..Self::node(node)
        }
    }

    /// A single plugin instance.
    pub fn instance(
        node: impl Into<String>,
        pipeline: impl Into<String>,
        signature: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            pipeline: Some(pipeline.into()),
            signature: Some(signature.into()),
            instance: Some(instance.into()),
        }
    }

    /// Whether `other` falls under this pattern.
    ///
    /// `None` fields in `self` match anything; set fields must be equal.
    pub fn matches(&self, other: &PathTuple) -> bool {
        fn field(pattern: &Option<String>, value: &Option<String>) -> bool {
            match pattern {
                None => true,
                Some(p) => value.as_deref() == Some(p.as_str()),
            }
        }

        self.node == other.node
            && field(&self.pipeline, &other.pipeline)
            && field(&self.signature, &other.signature)
            && field(&self.instance, &other.instance)
    }

    /// Parse from a JSON path array such as `["node", "pipe", null, null]`.
    ///
    /// Shorter arrays are padded with `None`; the node must be a string.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| CoreError::DecodingError("payload path must be an array".into()))?;
        if items.is_empty() || items.len() > 4 {
            return Err(CoreError::DecodingError(format!(
                "payload path must have 1 to 4 elements, got {}",
                items.len()
            )));
        }

        let node = items[0]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::DecodingError("payload path node must be a string".into()))?
            .to_string();
        let part = |i: usize| -> Option<String> {
            items.get(i).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };

        Ok(Self {
            node,
            pipeline: part(1),
            signature: part(2),
            instance: part(3),
        })
    }

    /// Convert to the JSON array form.
    pub fn to_value(&self) -> Value {
        let opt = |s: &Option<String>| s.clone().map(Value::String).unwrap_or(Value::Null);
        Value::Array(vec![
            Value::String(self.node.clone()),
            opt(&self.pipeline),
            opt(&self.signature),
            opt(&self.instance),
        ])
    }
}

impl From<PathTuple> for [Option<String>; 4] {
    fn from(path: PathTuple) -> Self {
        [Some(path.node), path.pipeline, path.signature, path.instance]
    }
}

impl TryFrom<[Option<String>; 4]> for PathTuple {
    type Error = CoreError;

    fn try_from(parts: [Option<String>; 4]) -> Result<Self> {
        let [node, pipeline, signature, instance] = parts;
        let node = node.ok_or_else(|| CoreError::DecodingError("path without node".into()))?;
        Ok(Self {
            node,
            pipeline,
            signature,
            instance,
        })
    }
}

impl fmt::Display for PathTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |s: &Option<String>| s.clone().unwrap_or_else(|| "*".into());
        write!(
            f,
            "{}/{}/{}/{}",
            self.node,
            part(&self.pipeline),
            part(&self.signature),
            part(&self.instance)
        )
    }
}
