//! Client configuration.

use std::path::Path;
use std::time::Duration;

use edgemesh_net::{Fleet, SignaturePolicy};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Configuration for the [`Client`](crate::Client).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Topic namespace shared with the edge nodes.
    pub namespace: String,
    /// `INITIATOR_ID` stamped on outbound commands.
    pub initiator_id: String,
    /// Accepted node ids or addresses. `None` accepts every node.
    pub fleet: Option<Vec<String>>,
    /// Time allowed until the first expected notification (ms).
    pub first_response_timeout_ms: u64,
    /// Time allowed for a command to complete (ms).
    pub ceiling_timeout_ms: u64,
    /// What to require of inbound signatures.
    pub signature_policy: SignaturePolicy,
    /// Capacity of event channels.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            namespace: "edgemesh".into(),
            initiator_id: "edgemesh-client".into(),
            fleet: None,
            first_response_timeout_ms: 10_000,
            ceiling_timeout_ms: 120_000,
            signature_policy: SignaturePolicy::Skip,
            channel_capacity: 1024,
        }
    }
}

impl ClientConfig {
    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains(['/', '+', '#']) {
            return Err(ClientError::Config(format!(
                "invalid namespace: {:?}",
                self.namespace
            )));
        }
        if self.first_response_timeout_ms == 0 || self.ceiling_timeout_ms == 0 {
            return Err(ClientError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn first_response_timeout(&self) -> Duration {
        Duration::from_millis(self.first_response_timeout_ms)
    }

    pub fn ceiling_timeout(&self) -> Duration {
        Duration::from_millis(self.ceiling_timeout_ms)
    }

    pub fn fleet(&self) -> Fleet {
        match &self.fleet {
            None => Fleet::Any,
            Some(members) => Fleet::only(members.iter().cloned()),
        }
    }
}
