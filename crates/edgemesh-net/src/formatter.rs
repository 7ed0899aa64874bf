//! Formatter registry.
//!
//! Edge nodes may publish in different wire dialects. A frame names its
//! dialect in `EE_FORMATTER`; the router looks that name up here and uses the
//! formatter to bring the frame into the internal shape. Frames without the
//! field use [`RAW_FORMATTER`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{NetError, Result};

/// Name of the always-present identity formatter.
pub const RAW_FORMATTER: &str = "raw";

/// Encode/decode pair for one wire dialect.
pub trait Formatter: Send + Sync {
    /// Wire → internal.
    fn decode(&self, message: Map<String, Value>) -> anyhow::Result<Map<String, Value>>;

    /// Internal → wire.
    fn encode(&self, message: Map<String, Value>) -> anyhow::Result<Map<String, Value>>;
}

/// Passes messages through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawFormatter;

impl Formatter for RawFormatter {
    fn decode(&self, message: Map<String, Value>) -> anyhow::Result<Map<String, Value>> {
        Ok(message)
    }

    fn encode(&self, message: Map<String, Value>) -> anyhow::Result<Map<String, Value>> {
        Ok(message)
    }
}

/// Named formatters. Registration is allowed at any time.
pub struct FormatterRegistry {
    formatters: RwLock<HashMap<String, Arc<dyn Formatter>>>,
}

impl FormatterRegistry {
    /// A registry holding only [`RawFormatter`].
    pub fn new() -> Self {
        let mut formatters: HashMap<String, Arc<dyn Formatter>> = HashMap::new();
        formatters.insert(RAW_FORMATTER.to_string(), Arc::new(RawFormatter));
        Self {
            formatters: RwLock::new(formatters),
        }
    }

    /// Register or replace a formatter.
    pub fn register(&self, name: impl Into<String>, formatter: Arc<dyn Formatter>) {
        self.formatters.write().insert(name.into(), formatter);
    }

    /// Look a formatter up by name; `None` selects the raw formatter.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn Formatter>> {
        let name = name.unwrap_or(RAW_FORMATTER);
        self.formatters
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| NetError::UnknownFormat(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formatters.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.formatters.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Moves `DATA.*` to the top level.
    struct Flatten;

    impl Formatter for Flatten {
        fn decode(&self, mut message: Map<String, Value>) -> anyhow::Result<Map<String, Value>> {
            let Some(Value::Object(data)) = message.remove("DATA") else {
                anyhow::bail!("missing DATA");
            };
            message.extend(data);
            Ok(message)
        }

        fn encode(&self, message: Map<String, Value>) -> anyhow::Result<Map<String, Value>> {
            let mut wire = Map::new();
            wire.insert("DATA".into(), Value::Object(message));
            Ok(wire)
        }
    }

    #[test]
    fn test_raw_is_default() {
        let registry = FormatterRegistry::new();
        let formatter = registry.resolve(None).unwrap();
        let message = json!({"A": 1}).as_object().cloned().unwrap();
        assert_eq!(formatter.decode(message.clone()).unwrap(), message);
        assert_eq!(registry.names(), vec!["raw"]);
    }

    #[test]
    fn test_unknown_formatter() {
        let registry = FormatterRegistry::new();
        assert!(matches!(
            registry.resolve(Some("cavi2")),
            Err(NetError::UnknownFormat(name)) if name == "cavi2"
        ));
    }

    #[test]
    fn test_hot_registration() {
        let registry = FormatterRegistry::new();
        registry.register("flat", Arc::new(Flatten));
        assert!(registry.contains("flat"));

        let formatter = registry.resolve(Some("flat")).unwrap();
        let decoded = formatter
            .decode(json!({"X": 1, "DATA": {"Y": 2}}).as_object().cloned().unwrap())
            .unwrap();
        assert_eq!(Value::Object(decoded), json!({"X": 1, "Y": 2}));

        assert!(formatter
            .decode(json!({"X": 1}).as_object().cloned().unwrap())
            .is_err());
    }
}
