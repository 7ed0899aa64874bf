//! Snapshot types held by the cache.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A JSON object.
pub type Object = Map<String, Value>;

/// The remote clock reported by a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTime {
    /// Remote wall-clock time, as sent.
    pub date: Option<String>,
    /// Remote timezone, as sent.
    pub timezone: Option<String>,
}

/// One running plugin instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub config: Object,
    pub stats: Object,
}

/// One pipeline and its plugin instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub config: Object,
    pub stats: Object,
    /// signature → instance id → instance.
    pub plugins: BTreeMap<String, BTreeMap<String, InstanceState>>,
}

impl PipelineState {
    /// Find an instance by id under any signature.
    pub fn find_instance(&self, instance_id: &str) -> Option<(&str, &InstanceState)> {
        self.plugins.iter().find_map(|(signature, instances)| {
            instances
                .get(instance_id)
                .map(|instance| (signature.as_str(), instance))
        })
    }

    /// Number of instances across all signatures.
    pub fn instance_count(&self) -> usize {
        self.plugins.values().map(BTreeMap::len).sum()
    }
}

/// The data portion of a heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// pipeline name → pipeline.
    pub pipelines: BTreeMap<String, PipelineState>,
    /// Heartbeat fields not folded into the pipeline tree.
    pub extra: Object,
}

/// The last known state of an edge node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Local time the snapshot was stored (Unix ms).
    pub last_update: i64,
    pub node_time: NodeTime,
    pub data: NodeData,
}

/// A fleet topology view reported by a supervisor node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Local time the snapshot was received (Unix ms).
    pub received_at: i64,
    /// node identifier → status record.
    pub nodes: BTreeMap<String, Value>,
}
