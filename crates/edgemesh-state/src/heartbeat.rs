//! Heartbeat decoding.
//!
//! Edge nodes report their running configuration as a list of pipeline
//! configs (`CONFIG_STREAMS`), each listing its plugins and their instances,
//! plus per-instance runtime stats (`ACTIVE_PLUGINS`) and per-pipeline stats
//! (`DCT_STATS`). This module folds those into a [`NodeData`] tree.

use edgemesh_core::{PathTuple, PAYLOAD_PATH_FIELD};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, StateError};
use crate::snapshot::{
    InstanceState, NetworkSnapshot, NodeData, NodeTime, Object, PipelineState,
};

pub const CONFIG_STREAMS: &str = "CONFIG_STREAMS";
pub const ACTIVE_PLUGINS: &str = "ACTIVE_PLUGINS";
pub const DCT_STATS: &str = "DCT_STATS";
pub const CURRENT_TIME: &str = "CURRENT_TIME";
pub const TIMEZONE: &str = "EE_TIMEZONE";
pub const CURRENT_NETWORK: &str = "CURRENT_NETWORK";

/// Legacy node-id field used when no payload path is present.
pub const NODE_ID_FIELD: &str = "EE_ID";

const NAME: &str = "NAME";
const PLUGINS: &str = "PLUGINS";
const SIGNATURE: &str = "SIGNATURE";
const INSTANCES: &str = "INSTANCES";
const INSTANCE_ID: &str = "INSTANCE_ID";
const STREAM_ID: &str = "STREAM_ID";

/// A decoded heartbeat for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub node: String,
    pub node_time: NodeTime,
    pub data: NodeData,
}

impl Heartbeat {
    /// Build from a complete heartbeat message.
    ///
    /// The node is taken from `EE_PAYLOAD_PATH`, falling back to `EE_ID`.
    pub fn from_value(message: &Value) -> Result<Self> {
        let fields = message
            .as_object()
            .ok_or_else(|| StateError::InvalidHeartbeat("heartbeat must be an object".into()))?;

        let node = match fields.get(PAYLOAD_PATH_FIELD) {
            Some(path) => PathTuple::from_value(path)
                .map(|p| p.node)
                .map_err(|e| StateError::InvalidHeartbeat(e.to_string()))?,
            None => str_field(fields, NODE_ID_FIELD)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| StateError::InvalidHeartbeat("no node identifier".into()))?
                .to_string(),
        };

        Self::from_fields(node, fields)
    }

    /// Build from the data fields of a heartbeat message.
    ///
    /// Missing sections yield empty trees; sections of the wrong JSON type are
    /// rejected.
    pub fn from_fields(node: impl Into<String>, fields: &Object) -> Result<Self> {
        let mut pipelines = BTreeMap::new();

        for stream in array_field(fields, CONFIG_STREAMS)? {
            let (name, pipeline) = pipeline_from_config(stream)?;
            pipelines.insert(name, pipeline);
        }

        if let Some(stats) = fields.get(DCT_STATS).and_then(Value::as_object) {
            for (name, pipeline_stats) in stats {
                let Some(pipeline) = pipelines.get_mut(name) else {
                    continue;
                };
                if let Some(s) = pipeline_stats.as_object() {
                    pipeline.stats = s.clone();
                }
            }
        }

        for active in array_field(fields, ACTIVE_PLUGINS)? {
            let Some(active) = active.as_object() else {
                continue;
            };
            let (Some(stream), Some(signature), Some(instance_id)) = (
                str_field(active, STREAM_ID),
                str_field(active, SIGNATURE),
                str_field(active, INSTANCE_ID),
            ) else {
                continue;
            };
            // Stats for instances absent from the config are dropped
            if let Some(instance) = pipelines
                .get_mut(stream)
                .and_then(|p| p.plugins.get_mut(signature))
                .and_then(|i| i.get_mut(instance_id))
            {
                instance.stats = active.clone();
            }
        }

        let mut extra = fields.clone();
        for key in [CONFIG_STREAMS, ACTIVE_PLUGINS, DCT_STATS, PAYLOAD_PATH_FIELD] {
            extra.remove(key);
        }

        Ok(Self {
            node: node.into(),
            node_time: NodeTime {
                date: str_field(fields, CURRENT_TIME).map(String::from),
                timezone: str_field(fields, TIMEZONE).map(String::from),
            },
            data: NodeData { pipelines, extra },
        })
    }
}

/// Build a network snapshot from a supervisor payload's `CURRENT_NETWORK`.
pub fn network_snapshot_from_fields(fields: &Object, received_at: i64) -> Result<NetworkSnapshot> {
    let network = fields
        .get(CURRENT_NETWORK)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            StateError::InvalidNetworkSnapshot(format!("missing {} object", CURRENT_NETWORK))
        })?;

    Ok(NetworkSnapshot {
        received_at,
        nodes: network
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

fn pipeline_from_config(stream: &Value) -> Result<(String, PipelineState)> {
    let config = stream
        .as_object()
        .ok_or_else(|| StateError::InvalidHeartbeat("pipeline config must be an object".into()))?;
    let name = str_field(config, NAME)
        .ok_or_else(|| StateError::InvalidHeartbeat("pipeline config without NAME".into()))?
        .to_string();

    let mut plugins: BTreeMap<String, BTreeMap<String, InstanceState>> = BTreeMap::new();
    for plugin in array_field(config, PLUGINS)? {
        let Some(plugin) = plugin.as_object() else {
            continue;
        };
        let Some(signature) = str_field(plugin, SIGNATURE) else {
            continue;
        };
        let instances = plugins.entry(signature.to_string()).or_default();
        for instance in array_field(plugin, INSTANCES)? {
            let Some(instance) = instance.as_object() else {
                continue;
            };
            if let Some(id) = str_field(instance, INSTANCE_ID) {
                instances.insert(
                    id.to_string(),
                    InstanceState {
                        config: instance.clone(),
                        stats: Object::new(),
                    },
                );
            }
        }
    }

    let mut pipeline_config = config.clone();
    pipeline_config.remove(PLUGINS);

    Ok((
        name,
        PipelineState {
            config: pipeline_config,
            stats: Object::new(),
            plugins,
        },
    ))
}

fn array_field<'a>(fields: &'a Object, key: &str) -> Result<&'a [Value]> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(StateError::InvalidHeartbeat(format!("{} must be an array", key))),
    }
}

fn str_field<'a>(fields: &'a Object, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Object {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_pipeline_tree() {
        let hb = Heartbeat::from_fields(
            "node-1",
            &fields(json!({
                "CURRENT_TIME": "2026-01-14 12:00:00.000000",
                "EE_TIMEZONE": "UTC+2",
                "CONFIG_STREAMS": [{
                    "NAME": "cam-1",
                    "TYPE": "VideoStream",
                    "PLUGINS": [{
                        "SIGNATURE": "OBJECT_DETECTOR",
                        "INSTANCES": [{"INSTANCE_ID": "det-1", "THRESHOLD": 0.5}]
                    }]
                }],
                "ACTIVE_PLUGINS": [{
                    "STREAM_ID": "cam-1",
                    "SIGNATURE": "OBJECT_DETECTOR",
                    "INSTANCE_ID": "det-1",
                    "FREQUENCY": 10
                }],
                "DCT_STATS": {"cam-1": {"FPS": 25}},
                "MACHINE_IP": "10.0.0.1",
            })),
        )
        .unwrap();

        assert_eq!(hb.node_time.timezone.as_deref(), Some("UTC+2"));
        let pipeline = &hb.data.pipelines["cam-1"];
        assert_eq!(pipeline.config["TYPE"], json!("VideoStream"));
        assert!(!pipeline.config.contains_key("PLUGINS"));
        assert_eq!(pipeline.stats["FPS"], json!(25));

        let instance = &pipeline.plugins["OBJECT_DETECTOR"]["det-1"];
        assert_eq!(instance.config["THRESHOLD"], json!(0.5));
        assert_eq!(instance.stats["FREQUENCY"], json!(10));

        assert_eq!(hb.data.extra["MACHINE_IP"], json!("10.0.0.1"));
        assert!(!hb.data.extra.contains_key("CONFIG_STREAMS"));
    }

    #[test]
    fn test_empty_heartbeat() {
        let hb = Heartbeat::from_fields("node-1", &Object::new()).unwrap();
        assert!(hb.data.pipelines.is_empty());
        assert_eq!(hb.node_time, NodeTime::default());
    }

    #[test]
    fn test_malformed_sections_rejected() {
        assert!(Heartbeat::from_fields("n", &fields(json!({"CONFIG_STREAMS": 3}))).is_err());
        assert!(
            Heartbeat::from_fields("n", &fields(json!({"CONFIG_STREAMS": [{"TYPE": "x"}]})))
                .is_err()
        );
    }

    #[test]
    fn test_node_from_payload_path() {
        let hb = Heartbeat::from_value(&json!({
            "EE_PAYLOAD_PATH": ["node-7", null, null, null],
            "EE_ID": "ignored",
        }))
        .unwrap();
        assert_eq!(hb.node, "node-7");
        assert!(!hb.data.extra.contains_key("EE_PAYLOAD_PATH"));

        let hb = Heartbeat::from_value(&json!({"EE_ID": "node-8"})).unwrap();
        assert_eq!(hb.node, "node-8");

        assert!(Heartbeat::from_value(&json!({"CONFIG_STREAMS": []})).is_err());
        assert!(Heartbeat::from_value(&json!("node-1")).is_err());
    }

    #[test]
    fn test_network_snapshot() {
        let snapshot = network_snapshot_from_fields(
            &fields(json!({"CURRENT_NETWORK": {"node-1": {"working": "ONLINE"}}})),
            42,
        )
        .unwrap();
        assert_eq!(snapshot.received_at, 42);
        assert_eq!(snapshot.nodes["node-1"]["working"], json!("ONLINE"));

        assert!(network_snapshot_from_fields(&Object::new(), 0).is_err());
    }
}
